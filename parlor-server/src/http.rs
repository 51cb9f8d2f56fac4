//! Parlor HTTP API
//!
//! Axum server exposing the agent endpoint plus health and version endpoints.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(status, body)`, so the logic is testable without a router.
//!
//! Endpoints:
//! - POST /api/<agent_name> — agent request (bearer token required)
//! - GET  /health           — storage backend status
//! - GET  /version          — server version info

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use parlor_core::{AgentRequest, AgentResponse, MessageStore, ParlorConfig};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::auth::{require_bearer, BearerToken};
use crate::pipeline::Pipeline;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pipeline: Pipeline,
    pub config: ParlorConfig,
}

impl HttpState {
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        self.pipeline.store()
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let agent_path = format!("/api/{}", state.config.service.agent_name);
    let token = BearerToken::new(&state.config.auth.bearer_token);

    let agent_routes = Router::new()
        .route(&agent_path, post(agent_handler))
        .route_layer(middleware::from_fn_with_state(token, require_bearer));

    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .merge(agent_routes)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let agent_name = state.config.service.agent_name.clone();

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Parlor HTTP API listening on http://{}/api/{}", addr, agent_name);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner agent request — runs the pipeline and maps the outcome to HTTP.
pub async fn agent_inner(pipeline: &Pipeline, request: AgentRequest) -> (StatusCode, AgentResponse) {
    let session_id = request.session_id.clone();
    match pipeline.run_detached(request).await {
        Ok(response) => (StatusCode::OK, response),
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(session_id = %session_id, error = %e, "Agent request failed");
            } else {
                tracing::warn!(session_id = %session_id, error = %e, "Agent request rejected");
            }
            (status, AgentResponse::err(e.public_message()))
        }
    }
}

/// Inner health check — checks the store and returns (status_code, json_body).
pub async fn health_inner(store: &dyn MessageStore) -> (StatusCode, serde_json::Value) {
    match store.health().await {
        Ok(detail) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "backend": store.name(),
                "storage": detail,
            }),
        ),
        Err(e) => {
            tracing::warn!(backend = store.name(), error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "backend": store.name(),
                    "error": "storage unavailable",
                }),
            )
        }
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "parlor/1",
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn agent_handler(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected malformed agent request");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(AgentResponse::err("Invalid request body")),
            );
        }
    };

    let (status, body) = agent_inner(&state.pipeline, request).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store().as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
