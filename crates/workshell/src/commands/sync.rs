//! `workshell sync`: one reconciliation pass.

use secrecy::ExposeSecret;
use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, warn};

use workshell_core::{
    ExistingKey, FileInventory, KeyMaterial, OsFileSystem, ReconcileReport, StaticInventory,
    write_private_key,
};

use super::util;
use crate::cli::{GlobalOpts, SyncArgs};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

// ── Output rows ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SyncedHost {
    workspace: String,
    port: u16,
    status: &'static str,
}

#[derive(Tabled)]
struct SyncedRow {
    #[tabled(rename = "Workspace")]
    workspace: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Status")]
    status: &'static str,
}

fn rows(report: &ReconcileReport) -> Vec<SyncedHost> {
    report
        .ports
        .iter()
        .map(|(id, port)| SyncedHost {
            workspace: id.to_string(),
            port,
            status: if report.added.contains(id) { "added" } else { "kept" },
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::resolve(global)?;
    let cache = FileInventory::new(OsFileSystem, &ctx.paths.workspace_cache);

    let inventory = if let Some(ref path) = args.from_file {
        debug!(path = %path.display(), "reading workspaces from file");
        FileInventory::new(OsFileSystem, path).load()?
    } else if args.offline {
        debug!(path = %cache.path().display(), "reading cached workspaces");
        cache.load()?
    } else {
        let fetched = fetch(&ctx, global).await?;
        cache.store(fetched.workspaces())?;
        fetched
    };

    if let Err(err) = ExistingKey::new(&ctx.paths.key).private_key_path() {
        warn!("{err}; entries will point at a missing key");
    }

    let mut reconciler = ctx.reconciler();
    if args.backup || ctx.backup {
        reconciler = reconciler.with_backup_dir(&ctx.paths.backup_dir);
    }
    let report = reconciler.reconcile(&inventory)?;

    if !global.quiet {
        let color = output::should_color(&global.color);
        for id in &report.added {
            eprintln!("{} {id}", output::change_marker(true, color));
        }
        for host in &report.removed {
            eprintln!("{} {host}", output::change_marker(false, color));
        }
        if let Some(ref backup) = report.backup_path {
            eprintln!("Backup written to {}", backup.display());
        }
    }

    let hosts = rows(&report);
    let out = output::render_list(
        &global.output,
        &hosts,
        |h| SyncedRow {
            workspace: h.workspace.clone(),
            port: h.port,
            status: h.status,
        },
        |h| format!("{}\t{}", h.workspace, h.port),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Fetch the user's workspaces and private key from the API.
async fn fetch(ctx: &Context, global: &GlobalOpts) -> Result<StaticInventory, CliError> {
    let client = ctx.client(global)?;
    let spinner = util::spinner("Fetching workspaces", global.quiet);

    let result = async {
        let org = util::resolve_org(&client, ctx).await?;
        let workspaces = client.my_workspaces(&org).await?;
        let keys = client.current_user_keys().await?;
        Ok::<_, CliError>((workspaces, keys))
    }
    .await;
    spinner.finish_and_clear();
    let (workspaces, keys) = result?;

    write_private_key(&ctx.paths.key, keys.private_key.expose_secret())?;
    debug!(path = %ctx.paths.key.display(), "private key written");

    Ok(StaticInventory::new(util::reachable(&workspaces)))
}
