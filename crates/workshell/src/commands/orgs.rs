//! `workshell orgs`: organizations the token can see.

use tabled::Tabled;

use workshell_api::Organization;

use super::util;
use crate::cli::GlobalOpts;
use crate::config::Context;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct OrgRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Active")]
    active: &'static str,
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::resolve(global)?;
    let client = ctx.client(global)?;

    let spinner = util::spinner("Fetching organizations", global.quiet);
    let fetched = client.list_organizations().await;
    spinner.finish_and_clear();
    let orgs: Vec<Organization> = fetched?;

    // Without a configured org, sync falls back to the first one listed.
    let active = ctx
        .profile
        .org_id
        .clone()
        .or_else(|| orgs.first().map(|o| o.id.clone()));

    let out = output::render_list(
        &global.output,
        &orgs,
        |o| OrgRow {
            name: o.name.clone(),
            id: o.id.clone(),
            active: if active.as_deref() == Some(o.id.as_str()) { "*" } else { "" },
        },
        |o| o.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
