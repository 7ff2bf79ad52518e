use crate::github::{self, GithubClient};
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use nexus_core::NexusError;
use nexus_provider::{QueryOutcome, QueryService, ToolRegistry, ToolSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// Startup snapshot of one provider slot in the fallback chain.
///
/// Unlike the registry, this also records providers that were skipped for
/// missing credentials, so health can report them.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Provider name.
    pub name: String,
    /// Whether the provider was initialized and is in the chain.
    pub available: bool,
    /// Model the provider runs, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Shared application state.
pub struct AppState {
    /// The query-handling façade.
    pub service: Arc<QueryService>,
    /// The startup-initialized tool registry.
    pub tools: Arc<ToolRegistry>,
    /// GitHub OAuth client, when configured.
    pub github: Option<Arc<GithubClient>>,
    /// Startup availability snapshot, in fallback-chain order.
    pub provider_status: Vec<ProviderStatus>,
    /// Deployment environment name.
    pub environment: String,
}

/// The main HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Builds the router over `state`, allowing CORS from `allowed_origins`.
    pub fn build(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/query", post(query_handler))
            .route("/tools", get(tools_handler))
            .route("/tools/registries", get(tool_registries_handler))
            .route("/auth/github/exchange", post(github::exchange_handler))
            .route("/auth/github/user", get(github::user_handler))
            .route("/auth/github/repos", get(github::repos_handler))
            .with_state(state)
            .layer(cors)
    }
}

/// Request body for `POST /query`.
///
/// Either `query` or `message` carries the text; both are accepted for
/// frontend compatibility.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    model_preference: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

fn failure_outcome(error: impl Into<String>) -> QueryOutcome {
    QueryOutcome {
        success: false,
        result_text: None,
        tools_used: Vec::new(),
        provider_used: None,
        execution_time_seconds: 0.0,
        error: Some(error.into()),
    }
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<QueryOutcome>) {
    let text = req.query.or(req.message).unwrap_or_default();

    info!(
        user_id = req.user_id.as_deref().unwrap_or("-"),
        session_id = req.session_id.as_deref().unwrap_or("-"),
        preference = req.model_preference.as_deref().unwrap_or("auto"),
        "Query received"
    );

    match state
        .service
        .handle(&text, req.model_preference.as_deref())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)),
        Err(NexusError::EmptyQuery) => (
            StatusCode::BAD_REQUEST,
            Json(failure_outcome("Query cannot be empty")),
        ),
        Err(e @ NexusError::ProviderUnavailable(_)) => {
            // A handled outcome, not a transport failure: the requested
            // provider is simply not configured on this deployment.
            (StatusCode::OK, Json(failure_outcome(e.to_string())))
        }
        Err(e) => {
            warn!(error = %e, "Query handling failed unexpectedly");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(failure_outcome(e.to_string())),
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolCounts {
    builtin: usize,
    remote: usize,
    total: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    providers: Vec<ProviderStatus>,
    tools: ToolCounts,
    environment: String,
}

fn overall_status(providers: &[ProviderStatus]) -> &'static str {
    let available = providers.iter().filter(|p| p.available).count();
    if available == 0 {
        "degraded"
    } else if !providers.first().map(|p| p.available).unwrap_or(false) {
        "fallback_mode"
    } else {
        "healthy"
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: overall_status(&state.provider_status),
        providers: state.provider_status.clone(),
        tools: ToolCounts {
            builtin: state.tools.count_by_source(ToolSource::Builtin),
            remote: state.tools.count_by_source(ToolSource::Remote),
            total: state.tools.len(),
        },
        environment: state.environment.clone(),
    })
}

async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let available: Vec<&str> = state
        .provider_status
        .iter()
        .filter(|p| p.available)
        .map(|p| p.name.as_str())
        .collect();

    Json(serde_json::json!({
        "message": "Nexus AI Backend",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "fallback_chain": available,
        "tools": state.tools.len(),
    }))
}

async fn tools_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "total_tools": state.tools.len(),
        "builtin_count": state.tools.count_by_source(ToolSource::Builtin),
        "remote_count": state.tools.count_by_source(ToolSource::Remote),
        "tools": state.tools.tools(),
    }))
}

async fn tool_registries_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.tools.registries())
}
