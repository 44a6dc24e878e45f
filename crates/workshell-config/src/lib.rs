//! Shared configuration for the workshell CLI.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and the
//! on-disk locations a sync pass works with: the SSH config, the private
//! key, the workspace cache and the backup directory. The CLI layers its
//! global flags on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use workshell_core::{DEFAULT_BASE_PORT, PortPolicy};

/// API endpoint used when a profile doesn't name one.
pub const DEFAULT_API_URL: &str = "https://api.workshell.dev";

/// Keyring service name for stored tokens.
const KEYRING_SERVICE: &str = "workshell";

/// Directory under `$HOME` holding the key, cache and backups.
const STATE_DIR: &str = ".workshell";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("unknown profile '{name}'")]
    UnknownProfile { name: String },

    #[error("cannot determine the home directory")]
    NoHomeDirectory,

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the explicit one, else the configured
    /// default, else `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// First local port handed to a workspace.
    #[serde(default = "default_port_base")]
    pub port_base: u16,

    /// Highest local port that may be handed out.
    #[serde(default = "default_port_ceiling")]
    pub port_ceiling: u16,

    /// Back up the SSH config before each sync.
    #[serde(default)]
    pub backup: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            port_base: default_port_base(),
            port_ceiling: default_port_ceiling(),
            backup: false,
        }
    }
}

impl Defaults {
    pub fn port_policy(&self) -> Result<PortPolicy, ConfigError> {
        if self.port_base > self.port_ceiling {
            return Err(ConfigError::Validation {
                field: "port_base".into(),
                reason: format!(
                    "{} is above port_ceiling {}",
                    self.port_base, self.port_ceiling
                ),
            });
        }
        Ok(PortPolicy {
            base: self.port_base,
            ceiling: self.port_ceiling,
        })
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_port_base() -> u16 {
    DEFAULT_BASE_PORT
}
fn default_port_ceiling() -> u16 {
    u16::MAX
}

/// A named API profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Organization whose workspaces are synced. The first organization
    /// listed by the API is used when unset.
    pub org_id: Option<String>,

    /// API token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the API token.
    pub token_env: Option<String>,

    /// Override `~/.ssh/config`.
    pub ssh_config: Option<PathBuf>,

    /// Override `~/.workshell/workshell.pem`.
    pub key_path: Option<PathBuf>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            org_id: None,
            token: None,
            token_env: None,
            ssh_config: None,
            key_path: None,
            ca_cert: None,
            timeout: None,
        }
    }
}

impl Profile {
    pub fn api_url(&self) -> Result<url::Url, ConfigError> {
        self.api_url.parse().map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", self.api_url),
        })
    }

    pub fn timeout(&self, defaults: &Defaults) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(defaults.timeout))
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "workshell", "workshell").map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("workshell");
    p
}

pub fn home_dir() -> Result<PathBuf, ConfigError> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDirectory)
}

/// Locations used by a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPaths {
    pub ssh_config: PathBuf,
    pub key: PathBuf,
    /// JSON cache of the last fetched workspace list.
    pub workspace_cache: PathBuf,
    pub backup_dir: PathBuf,
}

impl SyncPaths {
    /// Standard locations below `home`.
    pub fn under(home: &Path) -> Self {
        let state = home.join(STATE_DIR);
        Self {
            ssh_config: home.join(".ssh").join("config"),
            key: state.join("workshell.pem"),
            workspace_cache: state.join("workspaces.json"),
            backup_dir: state,
        }
    }

    /// Standard locations with the profile's overrides applied.
    pub fn for_profile(profile: &Profile) -> Result<Self, ConfigError> {
        let mut paths = Self::under(&home_dir()?);
        if let Some(ref ssh_config) = profile.ssh_config {
            paths.ssh_config.clone_from(ssh_config);
        }
        if let Some(ref key) = profile.key_path {
            paths.key.clone_from(key);
        }
        Ok(paths)
    }
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` (missing file is fine) + `WORKSHELL_*` env.
///
/// Nested keys use a double underscore: `WORKSHELL_DEFAULTS__PORT_BASE`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WORKSHELL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the API token from the credential chain (no CLI flag step).
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(val) = profile
        .token_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring_entry(profile_name)
        .ok()
        .and_then(|entry| entry.get_password().ok())
    {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token for `profile_name` in the system keyring.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token)?;
    Ok(())
}

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
}
