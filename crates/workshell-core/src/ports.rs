// ── Local port allocation ──
//
// Ports live only in the SSH config: the file is the source of truth and
// the set of used ports is rebuilt from it before every allocation.

use std::collections::BTreeSet;

use crate::detector::{KeyPath, is_managed};
use crate::document::ConfigDocument;
use crate::error::CoreError;

/// Directive holding the forwarded local port of a managed entry.
pub const PORT: &str = "Port";

/// First port handed out to a workspace.
pub const DEFAULT_BASE_PORT: u16 = 2222;

/// Smallest port `>= base` not in `used`, or `None` if every port up to
/// 65535 is taken.
pub fn next_free_port(used: &BTreeSet<u16>, base: u16) -> Option<u16> {
    (base..=u16::MAX).find(|port| !used.contains(port))
}

/// Bounds for port allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPolicy {
    pub base: u16,
    /// Highest port that may be allocated (inclusive).
    pub ceiling: u16,
}

impl Default for PortPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_PORT,
            ceiling: u16::MAX,
        }
    }
}

impl PortPolicy {
    pub fn allocate(&self, used: &BTreeSet<u16>) -> Result<u16, CoreError> {
        next_free_port(used, self.base)
            .filter(|port| *port <= self.ceiling)
            .ok_or(CoreError::PortsExhausted {
                base: self.base,
                ceiling: self.ceiling,
            })
    }
}

/// Collect the `Port` of every managed block.
///
/// A managed block without a numeric `Port` is an integrity error: guessing
/// would risk handing the same port to two workspaces.
pub fn used_ports(document: &ConfigDocument, key: &KeyPath) -> Result<BTreeSet<u16>, CoreError> {
    document
        .blocks()
        .iter()
        .filter(|block| is_managed(block, key))
        .map(|block| managed_port(block.patterns().join(" "), block.directive(PORT)))
        .collect()
}

/// Parse the `Port` value of a managed block named `host`.
pub(crate) fn managed_port(host: String, value: Option<&str>) -> Result<u16, CoreError> {
    let Some(value) = value else {
        return Err(CoreError::ConfigIntegrity {
            host,
            reason: format!("missing {PORT} directive"),
        });
    };
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::ConfigIntegrity {
            host,
            reason: format!("{PORT} '{value}' is not a valid port number"),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::document::HostBlock;

    const KEY: &str = "/k/workshell.pem";

    fn managed(name: &str, port: Option<&str>) -> HostBlock {
        let block = HostBlock::new(name).with_directive("IdentityFile", KEY);
        match port {
            Some(p) => block.with_directive(PORT, p),
            None => block,
        }
    }

    #[test]
    fn first_port_is_base() {
        assert_eq!(next_free_port(&BTreeSet::new(), 2222), Some(2222));
    }

    #[test]
    fn skips_used_ports() {
        let used = BTreeSet::from([2222, 2223, 2225]);
        assert_eq!(next_free_port(&used, 2222), Some(2224));
    }

    #[test]
    fn ports_below_base_are_irrelevant() {
        let used = BTreeSet::from([22, 80]);
        assert_eq!(next_free_port(&used, 2222), Some(2222));
    }

    #[test]
    fn exhausted_range_returns_none() {
        let used = BTreeSet::from([65534, 65535]);
        assert_eq!(next_free_port(&used, 65534), None);
    }

    #[test]
    fn policy_enforces_ceiling() {
        let policy = PortPolicy {
            base: 2222,
            ceiling: 2223,
        };
        assert_eq!(policy.allocate(&BTreeSet::from([2222])).unwrap(), 2223);
        let err = policy.allocate(&BTreeSet::from([2222, 2223])).unwrap_err();
        assert!(matches!(
            err,
            CoreError::PortsExhausted {
                base: 2222,
                ceiling: 2223
            }
        ));
    }

    #[test]
    fn used_ports_only_counts_managed_blocks() {
        let mut doc = ConfigDocument::new();
        doc.append(managed("a", Some("2222")));
        doc.append(managed("b", Some("2224")));
        doc.append(HostBlock::new("mine").with_directive(PORT, "2223"));
        let used = used_ports(&doc, &KeyPath::new(KEY)).unwrap();
        assert_eq!(used, BTreeSet::from([2222, 2224]));
    }

    #[test]
    fn missing_port_is_integrity_error() {
        let mut doc = ConfigDocument::new();
        doc.append(managed("broken", None));
        let err = used_ports(&doc, &KeyPath::new(KEY)).unwrap_err();
        assert!(matches!(err, CoreError::ConfigIntegrity { ref host, .. } if host == "broken"));
    }

    #[test]
    fn non_numeric_port_is_integrity_error() {
        let mut doc = ConfigDocument::new();
        doc.append(managed("broken", Some("ssh")));
        let err = used_ports(&doc, &KeyPath::new(KEY)).unwrap_err();
        assert!(err.is_config_problem());
    }
}
