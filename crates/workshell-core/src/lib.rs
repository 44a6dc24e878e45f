// workshell-core: keeps ~/.ssh/config in step with the active workspace set.
//
// The SSH config file is the only state: managed entries are recognised by
// their IdentityFile and their ports are read back from the file on every
// pass.

pub mod detector;
pub mod document;
pub mod engine;
pub mod error;
pub mod fs;
pub mod inventory;
pub mod ports;
pub mod render;

// ── Primary re-exports ──────────────────────────────────────────────
pub use detector::{KeyPath, host_identifiers, is_managed};
pub use document::{ConfigDocument, Directive, HostBlock, ParseError, StanzaKind};
pub use engine::{ManagedEntry, ManagedPortMapping, ReconcileReport, Reconciler};
pub use error::CoreError;
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use inventory::{
    ExistingKey, FileInventory, InventoryError, KeyMaterial, StaticInventory,
    WorkspaceIdentifier, WorkspaceInventory, WorkspaceMetadata, write_private_key,
};
pub use ports::{DEFAULT_BASE_PORT, PortPolicy, next_free_port, used_ports};
pub use render::{entry_text, render_entry};
