//! CLI configuration: thin wrapper around `workshell_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--api-url, --token, --ssh-config, ...).

use std::time::Duration;

use secrecy::SecretString;

use workshell_api::{TlsMode, TransportConfig, WorkspaceClient};
use workshell_core::{KeyPath, OsFileSystem, PortPolicy, Reconciler};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use workshell_config::{
    Config, Profile, SyncPaths, config_path, load_config_or_default, save_config, store_token,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Everything a command needs, with flag overrides applied.
#[derive(Debug)]
pub struct Context {
    pub profile_name: String,
    pub profile: Profile,
    pub paths: SyncPaths,
    pub ports: PortPolicy,
    pub backup: bool,
    pub timeout: Duration,
}

impl Context {
    /// Resolve from the config file, the active profile and global flags.
    ///
    /// A profile that isn't configured resolves to defaults, so flags and
    /// environment variables alone are enough to run.
    pub fn resolve(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = load_config_or_default();
        let profile_name = active_profile_name(global, &cfg);
        let mut profile = cfg.profiles.get(&profile_name).cloned().unwrap_or_default();

        // Flag > env > profile
        if let Some(ref url) = global.api_url {
            profile.api_url.clone_from(url);
        }
        if let Some(ref org) = global.org {
            profile.org_id = Some(org.clone());
        }

        let mut paths = SyncPaths::for_profile(&profile)?;
        if let Some(ref ssh_config) = global.ssh_config {
            paths.ssh_config.clone_from(ssh_config);
        }
        if let Some(ref key) = global.key_path {
            paths.key.clone_from(key);
        }

        let timeout = global
            .timeout
            .map_or_else(|| profile.timeout(&cfg.defaults), Duration::from_secs);

        Ok(Self {
            ports: cfg.defaults.port_policy()?,
            backup: cfg.defaults.backup,
            profile_name,
            profile,
            paths,
            timeout,
        })
    }

    /// Reconciler over the real filesystem for the resolved paths.
    pub fn reconciler(&self) -> Reconciler<OsFileSystem> {
        Reconciler::new(OsFileSystem, &self.paths.ssh_config, KeyPath::new(&self.paths.key))
            .with_port_policy(self.ports)
    }

    /// Authenticated API client.
    pub fn client(&self, global: &GlobalOpts) -> Result<WorkspaceClient, CliError> {
        let token = self.resolve_token(global)?;
        let tls = self
            .profile
            .ca_cert
            .clone()
            .map_or(TlsMode::System, TlsMode::CustomCa);
        let transport = TransportConfig {
            tls,
            timeout: self.timeout,
        };
        let url = self.profile.api_url()?;
        Ok(WorkspaceClient::new(url.as_str(), &token, &transport)?)
    }

    fn resolve_token(&self, global: &GlobalOpts) -> Result<SecretString, CliError> {
        if let Some(ref token) = global.token {
            return Ok(SecretString::from(token.clone()));
        }
        Ok(workshell_config::resolve_token(
            &self.profile,
            &self.profile_name,
        )?)
    }
}
