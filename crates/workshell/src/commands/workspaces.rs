//! `workshell workspaces`: the user's workspaces and their local ports.

use std::collections::HashMap;

use serde::Serialize;
use tabled::Tabled;

use super::util;
use crate::cli::GlobalOpts;
use crate::config::Context;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct WorkspaceView {
    id: String,
    name: String,
    dns: String,
    status: String,
    /// Local port from the SSH config; `None` until the next sync.
    port: Option<u16>,
}

#[derive(Tabled)]
struct WorkspaceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "DNS")]
    dns: String,
    #[tabled(rename = "Port")]
    port: String,
}

fn to_row(w: &WorkspaceView) -> WorkspaceRow {
    WorkspaceRow {
        name: w.name.clone(),
        id: w.id.clone(),
        status: w.status.clone(),
        dns: w.dns.clone(),
        port: w.port.map_or_else(|| "-".into(), |p| p.to_string()),
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::resolve(global)?;
    let client = ctx.client(global)?;

    let spinner = util::spinner("Fetching workspaces", global.quiet);
    let fetched = async {
        let org = util::resolve_org(&client, &ctx).await?;
        Ok::<_, CliError>(client.my_workspaces(&org).await?)
    }
    .await;
    spinner.finish_and_clear();
    let workspaces = fetched?;

    let ports: HashMap<String, u16> = ctx
        .reconciler()
        .managed_entries()?
        .into_iter()
        .flat_map(|entry| {
            let port = entry.port;
            entry.patterns.into_iter().map(move |p| (p, port))
        })
        .collect();

    let views: Vec<WorkspaceView> = workspaces
        .into_iter()
        .map(|w| WorkspaceView {
            port: ports.get(&w.dns).copied(),
            id: w.id,
            name: w.name,
            dns: w.dns,
            status: w.status,
        })
        .collect();

    let out = output::render_list(&global.output, &views, to_row, |w| w.name.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
