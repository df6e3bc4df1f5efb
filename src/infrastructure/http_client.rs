//! Authenticated HTTP access to the chat backend.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{ApiConfig, AppError, Result, SessionConfig};

/// Cookie carrying the browser session.
const SESSION_COOKIE: &str = "__Secure-next-auth.session-token";
/// Endpoint exchanging the session cookie for a bearer token.
const SESSION_PATH: &str = "/api/auth/session";
/// Header scoping requests to a team workspace.
const ACCOUNT_HEADER: &str = "ChatGPT-Account-Id";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Credentials gathered from flags, environment and config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub session_token: Option<String>,
    pub workspace_id: Option<String>,
}

impl Credentials {
    /// Fills unset values from the config file. Blank values count as unset.
    #[must_use]
    pub fn or_config(self, config: &SessionConfig) -> Self {
        let pick = |first: Option<String>, second: &Option<String>| {
            non_blank(first).or_else(|| non_blank(second.clone()))
        };
        Self {
            access_token: pick(self.access_token, &config.access_token),
            session_token: pick(self.session_token, &config.session_token),
            workspace_id: pick(self.workspace_id, &config.workspace_id),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct AuthSession {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

/// Blocking client holding a resolved bearer token.
pub struct ApiClient {
    client: Client,
    base_url: String,
    access_token: String,
    workspace_id: Option<String>,
}

impl ApiClient {
    /// Builds the client and resolves a bearer token.
    ///
    /// Uses the access token when present, else exchanges the session token.
    ///
    /// # Errors
    /// Returns `AppError::Auth` if no token can be obtained.
    pub fn connect(api: &ApiConfig, credentials: &Credentials) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(api.user_agent.as_str())
            .build()
            .map_err(AppError::transport)?;
        let base_url = api.base_url.trim_end_matches('/').to_string();

        let access_token = match (&credentials.access_token, &credentials.session_token) {
            (Some(token), _) => token.clone(),
            (None, Some(session)) => exchange_session_token(&client, &base_url, session)?,
            (None, None) => {
                return Err(AppError::Auth {
                    message: "no access token; set CHATGPT_ACCESS_TOKEN or CHATGPT_SESSION_TOKEN"
                        .into(),
                })
            }
        };

        tracing::debug!(base_url = %base_url, workspace = ?credentials.workspace_id, "API client ready");

        Ok(Self {
            client,
            base_url,
            access_token,
            workspace_id: credentials.workspace_id.clone(),
        })
    }

    /// Authenticated GET returning the JSON body.
    ///
    /// # Errors
    /// Returns `AppError::Http` on a non-success status, `AppError::Transport`
    /// if the request or body decoding fails.
    pub fn get_json(&self, path: &str) -> Result<Value> {
        let mut request = self
            .client
            .get(self.url_for(path))
            .bearer_auth(&self.access_token);
        if let Some(ws) = &self.workspace_id {
            request = request.header(ACCOUNT_HEADER, ws);
        }

        let response = request.send().map_err(AppError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AppError::http(status.as_u16(), &body));
        }

        response.json::<Value>().map_err(AppError::transport)
    }

    /// Absolute URL of a path relative to the backend origin.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn exchange_session_token(client: &Client, base_url: &str, session: &str) -> Result<String> {
    tracing::debug!("Exchanging session cookie for an access token");

    let response = client
        .get(join_url(base_url, SESSION_PATH))
        .header(reqwest::header::COOKIE, format!("{SESSION_COOKIE}={session}"))
        .send()
        .map_err(AppError::transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Auth {
            message: format!("session exchange failed with HTTP {}", status.as_u16()),
        });
    }

    let session: AuthSession = response.json().map_err(AppError::transport)?;
    non_blank(session.access_token).ok_or_else(|| AppError::Auth {
        message: "session is not logged in; refresh the session token".into(),
    })
}
