//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use workshell_api::{Workspace, WorkspaceClient};
use workshell_core::WorkspaceMetadata;

use crate::config::Context;
use crate::error::CliError;

/// Spinner on stderr; hidden when quiet or not attached to a terminal.
pub fn spinner(message: &'static str, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷ "));
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Configured organization, or the first one the API lists.
pub async fn resolve_org(client: &WorkspaceClient, ctx: &Context) -> Result<String, CliError> {
    if let Some(ref org) = ctx.profile.org_id {
        return Ok(org.clone());
    }
    let org = client.default_organization().await?;
    tracing::debug!(org = %org.id, "using first organization");
    Ok(org.id)
}

/// Inventory record for an API workspace, keyed by its DNS name.
pub fn to_metadata(workspace: &Workspace) -> WorkspaceMetadata {
    let mut meta = WorkspaceMetadata::new(workspace.dns.as_str());
    meta.id.clone_from(&workspace.id);
    meta.name.clone_from(&workspace.name);
    meta.status.clone_from(&workspace.status);
    if !workspace.organization_id.is_empty() {
        meta.attributes
            .insert("organization_id".into(), workspace.organization_id.clone());
    }
    meta
}

/// Workspaces that can be reached over SSH (those with a DNS name).
pub fn reachable(workspaces: &[Workspace]) -> Vec<WorkspaceMetadata> {
    workspaces
        .iter()
        .filter(|w| !w.dns.is_empty())
        .map(to_metadata)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(id: &str, dns: &str) -> Workspace {
        Workspace {
            id: id.into(),
            name: format!("{id}-name"),
            organization_id: "org-1".into(),
            workspace_group_id: String::new(),
            workspace_class_id: String::new(),
            created_by_user_id: "u-1".into(),
            dns: dns.into(),
            status: "RUNNING".into(),
            git_repo: String::new(),
        }
    }

    #[test]
    fn workspaces_without_dns_are_skipped() {
        let all = [workspace("a", "a.example.dev"), workspace("b", "")];
        let inventory = reachable(&all);
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].identifier.as_str(), "a.example.dev");
        assert_eq!(inventory[0].id, "a");
        assert_eq!(inventory[0].attributes["organization_id"], "org-1");
    }
}
