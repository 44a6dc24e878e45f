//! Clap derive structures for the `workshell` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// workshell -- SSH access to your remote workspaces
#[derive(Debug, Parser)]
#[command(
    name = "workshell",
    version,
    about = "Keep your SSH config in step with your remote workspaces",
    long_about = "Adds a Host entry to ~/.ssh/config for every active workspace,\n\
        each with its own local port, and removes entries for workspaces\n\
        that are gone. Hosts you wrote yourself are never touched.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "WORKSHELL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, env = "WORKSHELL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// API token
    #[arg(long, env = "WORKSHELL_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Organization whose workspaces are synced
    #[arg(long, env = "WORKSHELL_ORG", global = true)]
    pub org: Option<String>,

    /// SSH config file to manage
    #[arg(long, env = "WORKSHELL_SSH_CONFIG", value_name = "PATH", global = true)]
    pub ssh_config: Option<PathBuf>,

    /// Private key that managed entries point at
    #[arg(long, env = "WORKSHELL_KEY_PATH", value_name = "PATH", global = true)]
    pub key_path: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "WORKSHELL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "WORKSHELL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile the SSH config with the active workspaces
    Sync(SyncArgs),

    /// List workspace entries currently in the SSH config
    Hosts,

    /// List your workspaces and their local ports
    #[command(alias = "ls")]
    Workspaces,

    /// List organizations you belong to
    Orgs,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Sync ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Use the cached workspace list instead of calling the API
    #[arg(long, conflicts_with = "from_file")]
    pub offline: bool,

    /// Read the active workspaces from a JSON file
    #[arg(long, value_name = "PATH")]
    pub from_file: Option<PathBuf>,

    /// Copy the SSH config aside before rewriting it
    #[arg(long)]
    pub backup: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a configuration value on the active profile
    Set {
        /// Config key (e.g. "api_url", "org_id", "ssh_config")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the active profile's API token in the system keyring
    SetToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
