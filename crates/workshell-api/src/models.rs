// Wire types for the workspace inventory API.
//
// Field names follow the API's camelCase JSON. Unknown fields are ignored
// and optional fields default, so newer servers don't break older clients.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Key pair the API provisions for the user. The private key is what
/// managed SSH entries point at.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserKeys {
    #[serde(deserialize_with = "secret_string")]
    pub private_key: SecretString,
    #[serde(default)]
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub workspace_group_id: String,
    #[serde(default)]
    pub workspace_class_id: String,
    #[serde(default)]
    pub created_by_user_id: String,
    /// Public DNS name; used as the SSH Host pattern.
    #[serde(default)]
    pub dns: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub git_repo: String,
}

/// Runtime placement of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMetadata {
    #[serde(default)]
    pub pod_name: String,
    #[serde(default)]
    pub namespace_name: String,
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}
