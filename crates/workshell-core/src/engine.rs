// ── Reconciliation engine ──
//
// One pass: load → diff against the active set → append missing entries
// (one flush per entry) → reload → prune stale managed entries → write.
//
// Ports are allocated before pruning, so a stale entry still holds its
// port while new entries are added in the same pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::detector::{KeyPath, is_managed};
use crate::document::{ConfigDocument, HostBlock};
use crate::error::CoreError;
use crate::fs::FileSystem;
use crate::inventory::{WorkspaceIdentifier, WorkspaceInventory};
use crate::ports::{PORT, PortPolicy, managed_port, used_ports};
use crate::render::render_entry;

// ── Results ─────────────────────────────────────────────────────────

/// Local port of every active workspace after a pass, in inventory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedPortMapping(IndexMap<WorkspaceIdentifier, u16>);

impl ManagedPortMapping {
    pub fn get(&self, identifier: &WorkspaceIdentifier) -> Option<u16> {
        self.0.get(identifier).copied()
    }

    pub fn port_for(&self, identifier: &WorkspaceIdentifier) -> Result<u16, CoreError> {
        self.get(identifier).ok_or_else(|| CoreError::PortNotFound {
            identifier: identifier.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkspaceIdentifier, u16)> {
        self.0.iter().map(|(id, port)| (id, *port))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, identifier: WorkspaceIdentifier, port: u16) {
        self.0.insert(identifier, port);
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub config_path: PathBuf,
    pub ports: ManagedPortMapping,
    /// Workspaces that received a new entry, in processing order.
    pub added: Vec<WorkspaceIdentifier>,
    /// Host patterns of the managed entries that were pruned.
    pub removed: Vec<String>,
    /// Copy of the pre-prune config, when backups are enabled.
    pub backup_path: Option<PathBuf>,
}

impl ReconcileReport {
    /// Whether the pass changed the managed entries at all.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// A managed entry as currently found in the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEntry {
    pub patterns: Vec<String>,
    pub port: u16,
}

impl ManagedEntry {
    /// First pattern, which is the workspace identifier for entries
    /// written by the engine.
    pub fn host(&self) -> &str {
        self.patterns.first().map_or("", String::as_str)
    }
}

// ── Reconciler ──────────────────────────────────────────────────────

/// Keeps the SSH config in step with the active workspace set.
#[derive(Debug)]
pub struct Reconciler<F> {
    fs: F,
    config_path: PathBuf,
    key: KeyPath,
    ports: PortPolicy,
    backup_dir: Option<PathBuf>,
}

impl<F: FileSystem> Reconciler<F> {
    pub fn new(fs: F, config_path: impl Into<PathBuf>, key: KeyPath) -> Self {
        Self {
            fs,
            config_path: config_path.into(),
            key,
            ports: PortPolicy::default(),
            backup_dir: None,
        }
    }

    pub fn with_port_policy(mut self, ports: PortPolicy) -> Self {
        self.ports = ports;
        self
    }

    /// Copy the config into `dir` before each final overwrite.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn key(&self) -> &KeyPath {
        &self.key
    }

    /// Run one full pass against `inventory`.
    pub fn reconcile(
        &self,
        inventory: &dyn WorkspaceInventory,
    ) -> Result<ReconcileReport, CoreError> {
        // What should exist. Asked first so a failing inventory leaves the
        // filesystem untouched.
        let active = inventory.list_active_workspaces()?;

        // 1. Current state (file is created empty if missing)
        let document = self.load_document()?;

        // 2. What we already manage
        let managed: HashSet<String> = document
            .blocks()
            .iter()
            .filter(|block| is_managed(block, &self.key))
            .flat_map(|block| block.patterns().iter().cloned())
            .collect();

        // 3. Diff
        debug!(
            active = active.len(),
            managed = managed.len(),
            "reconciling ssh config"
        );

        // 4. Add missing entries, one flush per entry
        let mut ports = ManagedPortMapping::default();
        let mut added = Vec::new();
        let mut seen = HashSet::new();
        for identifier in &active {
            if !seen.insert(identifier.as_str()) || managed.contains(identifier.as_str()) {
                continue;
            }
            let port = self.add_entry(identifier)?;
            ports.insert(identifier.clone(), port);
            added.push(identifier.clone());
        }

        // 5. Reload: the file now carries every appended entry
        let mut document = self.load_document()?;

        // 6. Prune managed entries with no active workspace
        let removed = self.prune(&mut document, &active);
        self.collect_retained_ports(&document, &active, &mut ports)?;

        // 7. Write back
        let backup_path = self.backup()?;
        self.persist(&document)?;

        info!(
            added = added.len(),
            removed = removed.len(),
            path = %self.config_path.display(),
            "ssh config reconciled"
        );

        Ok(ReconcileReport {
            config_path: self.config_path.clone(),
            ports,
            added,
            removed,
            backup_path,
        })
    }

    /// Managed entries currently in the config file, in file order.
    ///
    /// Read-only: a missing file yields an empty list.
    pub fn managed_entries(&self) -> Result<Vec<ManagedEntry>, CoreError> {
        if !self.exists()? {
            return Ok(Vec::new());
        }
        let document = self.read_document()?;
        document
            .blocks()
            .iter()
            .filter(|block| is_managed(block, &self.key))
            .map(|block| {
                let port = managed_port(block.patterns().join(" "), block.directive(PORT))?;
                Ok(ManagedEntry {
                    patterns: block.patterns().to_vec(),
                    port,
                })
            })
            .collect()
    }

    /// Load the config from disk, creating an empty file first if needed.
    pub fn load_document(&self) -> Result<ConfigDocument, CoreError> {
        if !self.exists()? {
            debug!(path = %self.config_path.display(), "creating empty ssh config");
            self.fs
                .create_empty(&self.config_path)
                .map_err(|e| CoreError::io(&self.config_path, e))?;
        }
        self.read_document()
    }

    // ── Steps ────────────────────────────────────────────────────────

    /// Allocate a port against the on-disk state and flush the new entry.
    fn add_entry(&self, identifier: &WorkspaceIdentifier) -> Result<u16, CoreError> {
        // Re-read: an earlier iteration may have appended an entry.
        let mut document = self.load_document()?;
        let used = used_ports(&document, &self.key)?;
        let port = self.ports.allocate(&used)?;

        document.append(render_entry(identifier, &self.key, port));
        self.persist(&document)?;

        info!(workspace = %identifier, port, "added ssh entry");
        Ok(port)
    }

    fn prune(&self, document: &mut ConfigDocument, active: &[WorkspaceIdentifier]) -> Vec<String> {
        let removed = document.retain_blocks(|block| {
            !is_managed(block, &self.key) || is_active(block, active)
        });

        removed
            .into_iter()
            .map(|block| {
                let host = block.patterns().join(" ");
                info!(host = %host, "pruned ssh entry for inactive workspace");
                host
            })
            .collect()
    }

    fn collect_retained_ports(
        &self,
        document: &ConfigDocument,
        active: &[WorkspaceIdentifier],
        ports: &mut ManagedPortMapping,
    ) -> Result<(), CoreError> {
        for identifier in active {
            if ports.get(identifier).is_some() {
                continue;
            }
            let entry = document.blocks().iter().find(|block| {
                is_managed(block, &self.key) && block.patterns().iter().any(|p| p == identifier.as_str())
            });
            if let Some(block) = entry {
                let port = managed_port(block.patterns().join(" "), block.directive(PORT))?;
                ports.insert(identifier.clone(), port);
            }
        }
        Ok(())
    }

    fn backup(&self) -> Result<Option<PathBuf>, CoreError> {
        let Some(dir) = &self.backup_dir else {
            return Ok(None);
        };
        let contents = self
            .fs
            .read_to_string(&self.config_path)
            .map_err(|e| CoreError::io(&self.config_path, e))?;
        let path = dir.join(format!("config.bak.{}", uuid::Uuid::new_v4()));
        self.fs
            .write(&path, &contents)
            .map_err(|e| CoreError::io(&path, e))?;
        debug!(backup = %path.display(), "backed up ssh config");
        Ok(Some(path))
    }

    // ── I/O helpers ──────────────────────────────────────────────────

    fn exists(&self) -> Result<bool, CoreError> {
        self.fs
            .exists(&self.config_path)
            .map_err(|e| CoreError::io(&self.config_path, e))
    }

    fn read_document(&self) -> Result<ConfigDocument, CoreError> {
        let text = self
            .fs
            .read_to_string(&self.config_path)
            .map_err(|e| CoreError::io(&self.config_path, e))?;
        ConfigDocument::parse(&text).map_err(|source| CoreError::Parse {
            path: self.config_path.clone(),
            source,
        })
    }

    fn persist(&self, document: &ConfigDocument) -> Result<(), CoreError> {
        self.fs
            .write(&self.config_path, &document.render())
            .map_err(|e| CoreError::io(&self.config_path, e))
    }
}

/// A managed block survives if any active workspace selects it.
fn is_active(block: &HostBlock, active: &[WorkspaceIdentifier]) -> bool {
    active.iter().any(|id| block.matches(id.as_str()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::inventory::StaticInventory;

    const CONFIG: &str = "/home/u/.ssh/config";
    const KEY: &str = "/home/u/.workshell/workshell.pem";

    fn reconciler(fs: &MemoryFileSystem) -> Reconciler<&MemoryFileSystem> {
        Reconciler::new(fs, CONFIG, KeyPath::new(KEY))
    }

    #[test]
    fn missing_config_is_created() {
        let fs = MemoryFileSystem::new();
        let report = reconciler(&fs)
            .reconcile(&StaticInventory::default())
            .unwrap();
        assert!(!report.changed());
        assert_eq!(fs.contents(CONFIG).as_deref(), Some(""));
    }

    #[test]
    fn ports_are_assigned_in_inventory_order() {
        let fs = MemoryFileSystem::new();
        let report = reconciler(&fs)
            .reconcile(&StaticInventory::from_identifiers(["b", "a"]))
            .unwrap();
        assert_eq!(report.ports.port_for(&"b".into()).unwrap(), 2222);
        assert_eq!(report.ports.port_for(&"a".into()).unwrap(), 2223);
        assert_eq!(report.added, vec![WorkspaceIdentifier::from("b"), "a".into()]);
    }

    #[test]
    fn duplicate_identifiers_are_added_once() {
        let fs = MemoryFileSystem::new();
        let report = reconciler(&fs)
            .reconcile(&StaticInventory::from_identifiers(["a", "a"]))
            .unwrap();
        assert_eq!(report.added.len(), 1);
        let text = fs.contents(CONFIG).unwrap();
        assert_eq!(text.matches("Host a\n").count(), 1);
    }

    #[test]
    fn unknown_port_lookup_fails() {
        let mapping = ManagedPortMapping::default();
        assert!(matches!(
            mapping.port_for(&"ghost".into()),
            Err(CoreError::PortNotFound { .. })
        ));
    }

    #[test]
    fn backup_copies_pre_prune_content() {
        let original = format!(
            "Host old\n\t Hostname 0.0.0.0\n\t IdentityFile {KEY}\n\t User brev\n\t Port 2222\n"
        );
        let fs = MemoryFileSystem::new().with_file(CONFIG, original.clone());
        let report = reconciler(&fs)
            .with_backup_dir("/home/u/.workshell")
            .reconcile(&StaticInventory::default())
            .unwrap();

        let backup = report.backup_path.unwrap();
        assert!(backup.starts_with("/home/u/.workshell"));
        assert_eq!(fs.contents(&backup).unwrap(), original);
        assert_eq!(fs.contents(CONFIG).unwrap(), "");
        assert_eq!(report.removed, vec!["old".to_string()]);
    }

    #[test]
    fn managed_entries_of_missing_file_is_empty() {
        let fs = MemoryFileSystem::new();
        assert!(reconciler(&fs).managed_entries().unwrap().is_empty());
        assert!(fs.paths().is_empty());
    }
}
