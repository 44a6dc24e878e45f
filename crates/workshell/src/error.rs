//! CLI error types with miette diagnostics.
//!
//! Maps core, API and config errors into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use workshell_config::ConfigError;
use workshell_core::{CoreError, InventoryError, ParseError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const SSH_CONFIG: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the workspace API")]
    #[diagnostic(
        code(workshell::connection_failed),
        help(
            "Check your network connection and the configured API URL.\n\
             Work from the last known workspaces with: workshell sync --offline"
        )
    )]
    ConnectionFailed {
        #[source]
        source: workshell_api::Error,
    },

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(workshell::tls_error),
        help("Check the ca_cert path configured in your profile.")
    )]
    TlsError { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(workshell::auth_failed),
        help(
            "Your API token was rejected.\n\
             Store a fresh one with: workshell config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No API token configured for profile '{profile}'")]
    #[diagnostic(
        code(workshell::no_credentials),
        help(
            "Configure one with: workshell config init\n\
             Or set the WORKSHELL_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(workshell::not_found),
        help("Run: workshell {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(workshell::api_error))]
    ApiError { status: u16, message: String },

    #[error("Unexpected API response: {message}")]
    #[diagnostic(code(workshell::api_response))]
    ApiResponse { message: String },

    // ── SSH config ───────────────────────────────────────────────────
    #[error("Cannot parse SSH config {path}")]
    #[diagnostic(
        code(workshell::ssh_config_parse),
        help("Fix the reported line; the file was left untouched.")
    )]
    SshConfigParse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("Managed SSH host '{host}' is inconsistent: {reason}")]
    #[diagnostic(
        code(workshell::ssh_config_integrity),
        help("Give the entry a numeric Port, or delete it and run: workshell sync")
    )]
    SshConfigIntegrity { host: String, reason: String },

    #[error("No free local port between {base} and {ceiling}")]
    #[diagnostic(
        code(workshell::ports_exhausted),
        help("Raise defaults.port_ceiling or remove stale workspace entries.")
    )]
    PortsExhausted { base: u16, ceiling: u16 },

    // ── Inventory ────────────────────────────────────────────────────
    #[error("Workspace list unavailable: {message}")]
    #[diagnostic(
        code(workshell::inventory),
        help("Refresh the cached workspace list with: workshell sync")
    )]
    Inventory { message: String },

    #[error("Private key unavailable at {path}: {reason}")]
    #[diagnostic(
        code(workshell::key_material),
        help("Run an online sync to download the key, or pass --key-path.")
    )]
    KeyMaterial { path: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(workshell::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(workshell::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: workshell config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(workshell::config))]
    Config(ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error("I/O error on {path}")]
    #[diagnostic(code(workshell::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(workshell::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(workshell::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::SshConfigParse { .. } | Self::SshConfigIntegrity { .. } => exit_code::SSH_CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn profile_not_found<'a>(
        name: impl Into<String>,
        available: impl Iterator<Item = &'a String>,
    ) -> Self {
        let available: Vec<&str> = available.map(String::as_str).collect();
        Self::ProfileNotFound {
            name: name.into(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Parse { path, source } => CliError::SshConfigParse {
                path: path.display().to_string(),
                source,
            },

            CoreError::ConfigIntegrity { host, reason } => {
                CliError::SshConfigIntegrity { host, reason }
            }

            CoreError::PortsExhausted { base, ceiling } => {
                CliError::PortsExhausted { base, ceiling }
            }

            CoreError::PortNotFound { identifier } => CliError::NotFound {
                resource_type: "workspace port".into(),
                identifier,
                list_command: "hosts".into(),
            },

            CoreError::Inventory(err) => err.into(),

            CoreError::KeyMaterial { path, reason } => CliError::KeyMaterial {
                path: path.display().to_string(),
                reason,
            },

            CoreError::Io { path, source } => CliError::Io {
                path: path.display().to_string(),
                source,
            },
        }
    }
}

impl From<InventoryError> for CliError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::UnknownWorkspace { identifier } => CliError::NotFound {
                resource_type: "workspace".into(),
                identifier,
                list_command: "workspaces".into(),
            },
            other => CliError::Inventory {
                message: other.to_string(),
            },
        }
    }
}

// ── API errors ───────────────────────────────────────────────────────

impl From<workshell_api::Error> for CliError {
    fn from(err: workshell_api::Error) -> Self {
        use workshell_api::Error as ApiError;

        if err.is_connection() {
            return CliError::ConnectionFailed { source: err };
        }
        match err {
            ApiError::Authentication { .. } | ApiError::Api { status: 401 | 403, .. } => {
                CliError::AuthFailed {
                    profile: "current".into(),
                }
            }
            ApiError::Tls(reason) => CliError::TlsError { reason },
            ApiError::Api { status, message } => CliError::ApiError { status, message },
            ApiError::InvalidUrl(e) => CliError::Validation {
                field: "api_url".into(),
                reason: e.to_string(),
            },
            ApiError::Deserialization { message, .. } => CliError::ApiResponse { message },
            transport @ ApiError::Transport(_) => CliError::ConnectionFailed { source: transport },
        }
    }
}

// ── Config errors ────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_config_problems_exit_with_dedicated_code() {
        let err: CliError = CoreError::ConfigIntegrity {
            host: "ws".into(),
            reason: "missing Port directive".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::SSH_CONFIG);
    }

    #[test]
    fn api_auth_failure_exits_with_auth_code() {
        let err: CliError = workshell_api::Error::Api {
            status: 401,
            message: "nope".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn missing_workspace_is_not_found() {
        let err: CliError = CoreError::PortNotFound {
            identifier: "ws".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
    }
}
