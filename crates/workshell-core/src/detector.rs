// ── Managed entry detection ──
//
// A Host block belongs to workshell iff its `IdentityFile` is the
// workshell private key. There is no comment or tag marker: a hand-written
// block that points at the same key is indistinguishable from a managed one.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::document::{HostBlock, StanzaKind};

/// Directive that carries the ownership marker.
pub const IDENTITY_FILE: &str = "IdentityFile";

/// Normalized path of the private key used by managed entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    path: PathBuf,
    home: Option<PathBuf>,
}

impl KeyPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: normalize(path.as_ref(), None),
            home: None,
        }
    }

    /// Expand `~/` in the key path and in compared values with `home`.
    pub fn with_home(path: impl AsRef<Path>, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            path: normalize(path.as_ref(), Some(&home)),
            home: Some(home),
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// Whether a raw `IdentityFile` value refers to this key.
    pub fn is_same(&self, value: &str) -> bool {
        let value = value.trim().trim_matches('"');
        normalize(Path::new(value), self.home.as_deref()) == self.path
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Lexical cleanup: expands `~/`, drops `.` components and repeated separators.
fn normalize(path: &Path, home: Option<&Path>) -> PathBuf {
    let expanded = match (home, path.strip_prefix("~")) {
        (Some(home), Ok(rest)) => home.join(rest),
        _ => path.to_path_buf(),
    };
    expanded
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Whether `block` is owned by workshell.
pub fn is_managed(block: &HostBlock, key: &KeyPath) -> bool {
    block.kind() == StanzaKind::Host
        && block
            .directives()
            .iter()
            .any(|d| d.name == IDENTITY_FILE && key.is_same(&d.value))
}

/// Host patterns of a block, in file order.
pub fn host_identifiers(block: &HostBlock) -> &[String] {
    block.patterns()
}
