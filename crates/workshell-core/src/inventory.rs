// ── Inventory and key material contracts ──
//
// The remote inventory and the private key are owned by collaborators
// outside this crate. The engine only sees these traits.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;
use crate::fs::FileSystem;

// ── Identifiers & metadata ──────────────────────────────────────────

/// Name of a remote workspace, used verbatim as the SSH Host pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceIdentifier(String);

impl WorkspaceIdentifier {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkspaceIdentifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkspaceIdentifier {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// What the inventory knows about one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    /// Host pattern for the workspace.
    pub identifier: WorkspaceIdentifier,
    /// Inventory-side id.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl WorkspaceMetadata {
    pub fn new(identifier: impl Into<WorkspaceIdentifier>) -> Self {
        Self {
            identifier: identifier.into(),
            id: String::new(),
            name: String::new(),
            status: String::new(),
            attributes: BTreeMap::new(),
        }
    }
}

// ── Inventory ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Workspace inventory unavailable: {message}")]
    Unavailable { message: String },

    #[error("Workspace '{identifier}' is not in the inventory")]
    UnknownWorkspace { identifier: String },

    #[error("Workspace cache {} is invalid: {reason}", path.display())]
    InvalidCache { path: PathBuf, reason: String },
}

/// Source of the set of active workspaces.
pub trait WorkspaceInventory {
    /// Active workspaces, in a stable order.
    fn list_active_workspaces(&self) -> Result<Vec<WorkspaceIdentifier>, InventoryError>;

    fn workspace_metadata(
        &self,
        identifier: &WorkspaceIdentifier,
    ) -> Result<WorkspaceMetadata, InventoryError>;
}

/// Inventory backed by an already-fetched list.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    workspaces: Vec<WorkspaceMetadata>,
}

impl StaticInventory {
    pub fn new(workspaces: Vec<WorkspaceMetadata>) -> Self {
        Self { workspaces }
    }

    /// Inventory listing exactly `identifiers`, without metadata.
    pub fn from_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<WorkspaceIdentifier>,
    {
        Self::new(
            identifiers
                .into_iter()
                .map(WorkspaceMetadata::new)
                .collect(),
        )
    }

    pub fn workspaces(&self) -> &[WorkspaceMetadata] {
        &self.workspaces
    }
}

impl WorkspaceInventory for StaticInventory {
    fn list_active_workspaces(&self) -> Result<Vec<WorkspaceIdentifier>, InventoryError> {
        Ok(self
            .workspaces
            .iter()
            .map(|w| w.identifier.clone())
            .collect())
    }

    fn workspace_metadata(
        &self,
        identifier: &WorkspaceIdentifier,
    ) -> Result<WorkspaceMetadata, InventoryError> {
        self.workspaces
            .iter()
            .find(|w| &w.identifier == identifier)
            .cloned()
            .ok_or_else(|| InventoryError::UnknownWorkspace {
                identifier: identifier.to_string(),
            })
    }
}

/// Inventory read from a JSON workspace cache (an array of
/// [`WorkspaceMetadata`]).
#[derive(Debug)]
pub struct FileInventory<F> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> FileInventory<F> {
    pub fn new(fs: F, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the cache.
    pub fn load(&self) -> Result<StaticInventory, InventoryError> {
        let text = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| self.invalid(e.to_string()))?;
        let workspaces: Vec<WorkspaceMetadata> =
            serde_json::from_str(&text).map_err(|e| self.invalid(e.to_string()))?;
        Ok(StaticInventory::new(workspaces))
    }

    /// Replace the cache with `workspaces`.
    pub fn store(&self, workspaces: &[WorkspaceMetadata]) -> Result<(), CoreError> {
        let text = serde_json::to_string_pretty(workspaces).map_err(|e| {
            CoreError::io(&self.path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        self.fs
            .write(&self.path, &text)
            .map_err(|e| CoreError::io(&self.path, e))
    }

    fn invalid(&self, reason: String) -> InventoryError {
        InventoryError::InvalidCache {
            path: self.path.clone(),
            reason,
        }
    }
}

impl<F: FileSystem> WorkspaceInventory for FileInventory<F> {
    fn list_active_workspaces(&self) -> Result<Vec<WorkspaceIdentifier>, InventoryError> {
        self.load()?.list_active_workspaces()
    }

    fn workspace_metadata(
        &self,
        identifier: &WorkspaceIdentifier,
    ) -> Result<WorkspaceMetadata, InventoryError> {
        self.load()?.workspace_metadata(identifier)
    }
}

// ── Key material ────────────────────────────────────────────────────

/// Provider of the private key that managed entries point at.
pub trait KeyMaterial {
    /// Path of a key file that exists with restrictive permissions.
    fn private_key_path(&self) -> Result<PathBuf, CoreError>;
}

/// A key file placed on disk by some earlier step.
#[derive(Debug, Clone)]
pub struct ExistingKey {
    path: PathBuf,
}

impl ExistingKey {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyMaterial for ExistingKey {
    fn private_key_path(&self) -> Result<PathBuf, CoreError> {
        if self.path.is_file() {
            Ok(self.path.clone())
        } else {
            Err(CoreError::KeyMaterial {
                path: self.path.clone(),
                reason: "file does not exist".into(),
            })
        }
    }
}

/// Write `pem` to `path` readable only by the owner, creating parent
/// directories as needed.
pub fn write_private_key(path: &Path, pem: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
    }
    std::fs::write(path, pem).map_err(|e| CoreError::io(path, e))?;
    restrict_permissions(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| CoreError::io(path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}
