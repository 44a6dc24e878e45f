// ── Core error types ──
//
// Every failure aborts the current reconciliation pass. Variants carry the
// file path, host pattern or workspace identifier involved so callers can
// report the problem without inspecting engine internals.

use std::path::PathBuf;

use thiserror::Error;

use crate::document::ParseError;
use crate::inventory::InventoryError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── SSH config errors ────────────────────────────────────────────
    #[error("Cannot parse SSH config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Managed SSH host '{host}' is inconsistent: {reason}")]
    ConfigIntegrity { host: String, reason: String },

    // ── Allocation errors ────────────────────────────────────────────
    #[error("No free local port between {base} and {ceiling}")]
    PortsExhausted { base: u16, ceiling: u16 },

    #[error("No port configured for workspace '{identifier}'")]
    PortNotFound { identifier: String },

    // ── Collaborator errors ──────────────────────────────────────────
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Private key not available at {}: {reason}", path.display())]
    KeyMaterial { path: PathBuf, reason: String },

    // ── I/O errors ───────────────────────────────────────────────────
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the SSH config itself is the problem (unparseable
    /// text or a managed entry the engine refuses to guess about).
    pub fn is_config_problem(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::ConfigIntegrity { .. })
    }
}
