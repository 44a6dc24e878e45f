// ── Managed entry rendering ──

use crate::detector::{IDENTITY_FILE, KeyPath};
use crate::document::HostBlock;
use crate::inventory::WorkspaceIdentifier;
use crate::ports::PORT;

/// Address the local port forward listens on.
pub const HOSTNAME: &str = "0.0.0.0";

/// Remote login user inside every workspace.
pub const USER: &str = "brev";

/// Build the managed Host block for a workspace.
///
/// Directive order is fixed so the same input always produces the same
/// text:
///
/// ```text
/// Host <identifier>
///  Hostname 0.0.0.0
///  IdentityFile <key>
///  User brev
///  Port <port>
/// ```
pub fn render_entry(identifier: &WorkspaceIdentifier, key: &KeyPath, port: u16) -> HostBlock {
    HostBlock::new(identifier.as_str())
        .with_directive("Hostname", HOSTNAME)
        .with_directive(IDENTITY_FILE, key.to_string())
        .with_directive("User", USER)
        .with_directive(PORT, port.to_string())
}

/// Text form of [`render_entry`].
pub fn entry_text(identifier: &WorkspaceIdentifier, key: &KeyPath, port: u16) -> String {
    render_entry(identifier, key, port).to_text()
}
