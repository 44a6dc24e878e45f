// Async HTTP client for the workspace inventory API.
//
// Auth: `Authorization: Bearer <token>` on every request.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{Organization, User, UserKeys, Workspace, WorkspaceMetadata};
use crate::transport::TransportConfig;

// ── Error response shape ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the inventory API.
#[derive(Debug)]
pub struct WorkspaceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl WorkspaceClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a bearer token and transport config.
    pub fn new(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("invalid token header value: {e}"),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = transport.build_client(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Ensure a trailing slash so relative `api/...` paths join below it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET api/me`
    pub async fn current_user(&self) -> Result<User, Error> {
        self.get("api/me").await
    }

    /// `GET api/me/keys`
    pub async fn current_user_keys(&self) -> Result<UserKeys, Error> {
        self.get("api/me/keys").await
    }

    /// `GET api/organizations`
    pub async fn list_organizations(&self) -> Result<Vec<Organization>, Error> {
        self.get("api/organizations").await
    }

    /// `GET api/organizations/{org}/workspaces`
    pub async fn list_workspaces(&self, org_id: &str) -> Result<Vec<Workspace>, Error> {
        self.get(&format!("api/organizations/{org_id}/workspaces"))
            .await
    }

    /// `GET api/workspaces/{id}/metadata`
    pub async fn workspace_metadata(&self, workspace_id: &str) -> Result<WorkspaceMetadata, Error> {
        self.get(&format!("api/workspaces/{workspace_id}/metadata"))
            .await
    }

    /// Workspaces in `org_id` created by the current user.
    pub async fn my_workspaces(&self, org_id: &str) -> Result<Vec<Workspace>, Error> {
        let user = self.current_user().await?;
        let workspaces = self.list_workspaces(org_id).await?;
        let total = workspaces.len();
        let mine: Vec<Workspace> = workspaces
            .into_iter()
            .filter(|w| w.created_by_user_id == user.id)
            .collect();
        debug!(org = org_id, total, mine = mine.len(), "filtered workspaces by creator");
        Ok(mine)
    }

    /// Organization to use when none is configured: the first one listed.
    pub async fn default_organization(&self) -> Result<Organization, Error> {
        self.list_organizations()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api {
                status: 404,
                message: "no organizations available for this user".into(),
            })
    }

    // ── HTTP ─────────────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.base_url.join(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::Authentication {
                message: "token rejected by the API".into(),
            };
        }

        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|err| err.message.or(err.error))
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });

        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}
