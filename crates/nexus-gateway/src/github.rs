use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use nexus_core::{NexusError, NexusResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::server::AppState;

/// GitHub OAuth application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubOauthConfig {
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret.
    pub client_secret: String,
    /// Base URL for the OAuth endpoints (overridable for tests).
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,
    /// Base URL for the GitHub REST API (overridable for tests).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_oauth_base_url() -> String {
    "https://github.com".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

/// Server-side token exchange response handed back to the frontend.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    /// The OAuth access token.
    pub access_token: String,
    /// Token type, normally `bearer`.
    pub token_type: String,
    /// Granted scopes.
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeReply {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Thin client for the GitHub OAuth flow and user API.
///
/// The backend only brokers the code-for-token exchange (which needs the
/// client secret) and forwards the caller's bearer token for user/repo
/// lookups; it stores nothing.
pub struct GithubClient {
    config: GithubOauthConfig,
    http: reqwest::Client,
}

impl GithubClient {
    /// Creates a client for the configured OAuth application.
    pub fn new(config: GithubOauthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Exchanges an OAuth authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> NexusResult<AccessToken> {
        let url = format!("{}/login/oauth/access_token", self.config.oauth_base_url);
        let body = serde_json::json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "code": code,
        });

        let resp = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NexusError::Gateway(format!(
                "GitHub token exchange failed with {status}"
            )));
        }

        let reply: ExchangeReply = resp
            .json()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))?;

        if let Some(error) = reply.error {
            return Err(NexusError::Gateway(format!(
                "GitHub token exchange rejected: {error}: {}",
                reply.error_description.unwrap_or_default()
            )));
        }

        match reply.access_token {
            Some(access_token) => Ok(AccessToken {
                access_token,
                token_type: reply.token_type.unwrap_or_else(|| "bearer".to_string()),
                scope: reply.scope.unwrap_or_default(),
            }),
            None => Err(NexusError::Gateway(
                "GitHub token exchange returned no access token".to_string(),
            )),
        }
    }

    async fn api_get(&self, path: &str, token: &str) -> NexusResult<serde_json::Value> {
        let url = format!("{}{path}", self.config.api_base_url);
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "nexus-backend")
            .send()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| NexusError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(NexusError::Gateway(format!(
                "GitHub API error {status}: {body}"
            )));
        }

        Ok(body)
    }

    /// Fetches the authenticated user's profile.
    pub async fn fetch_user(&self, token: &str) -> NexusResult<serde_json::Value> {
        self.api_get("/user", token).await
    }

    /// Fetches the authenticated user's repositories.
    pub async fn fetch_repos(&self, token: &str) -> NexusResult<serde_json::Value> {
        self.api_get("/user/repos", token).await
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeRequest {
    code: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": message.into()}))
}

pub(crate) async fn exchange_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExchangeRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(github) = &state.github else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            error_body("GitHub OAuth is not configured"),
        );
    };

    if req.code.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("code is required"));
    }

    match github.exchange_code(&req.code).await {
        Ok(token) => (
            StatusCode::OK,
            Json(serde_json::to_value(token).unwrap_or_default()),
        ),
        Err(e) => {
            warn!(error = %e, "GitHub token exchange failed");
            (StatusCode::BAD_GATEWAY, error_body(e.to_string()))
        }
    }
}

pub(crate) async fn user_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(github) = &state.github else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            error_body("GitHub OAuth is not configured"),
        );
    };

    let Some(token) = bearer_token(&headers) else {
        return (StatusCode::UNAUTHORIZED, error_body("bearer token required"));
    };

    match github.fetch_user(token).await {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => {
            warn!(error = %e, "GitHub user lookup failed");
            (StatusCode::BAD_GATEWAY, error_body(e.to_string()))
        }
    }
}

pub(crate) async fn repos_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(github) = &state.github else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            error_body("GitHub OAuth is not configured"),
        );
    };

    let Some(token) = bearer_token(&headers) else {
        return (StatusCode::UNAUTHORIZED, error_body("bearer token required"));
    };

    match github.fetch_repos(token).await {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => {
            warn!(error = %e, "GitHub repo lookup failed");
            (StatusCode::BAD_GATEWAY, error_body(e.to_string()))
        }
    }
}
