// workshell-api: Async client for the remote workspace inventory API

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::WorkspaceClient;
pub use error::Error;
pub use models::{Organization, User, UserKeys, Workspace, WorkspaceMetadata};
pub use transport::{TlsMode, TransportConfig};
