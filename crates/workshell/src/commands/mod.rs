//! Command handlers.

pub mod config_cmd;
pub mod hosts;
pub mod orgs;
pub mod sync;
pub mod util;
pub mod workspaces;
