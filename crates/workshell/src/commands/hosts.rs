//! `workshell hosts`: managed entries currently in the SSH config.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::config::Context;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Host {
    host: String,
    port: u16,
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Port")]
    port: u16,
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::resolve(global)?;
    let hosts: Vec<Host> = ctx
        .reconciler()
        .managed_entries()?
        .into_iter()
        .map(|entry| Host {
            host: entry.patterns.join(" "),
            port: entry.port,
        })
        .collect();

    if hosts.is_empty() && !global.quiet {
        eprintln!(
            "No workspace entries in {}. Run: workshell sync",
            ctx.paths.ssh_config.display()
        );
        return Ok(());
    }

    let out = output::render_list(
        &global.output,
        &hosts,
        |h| HostRow {
            host: h.host.clone(),
            port: h.port,
        },
        |h| h.host.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
