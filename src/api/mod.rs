//! HTTP API layer.
//!
//! A thin shell over the agent's three entry points: chat, tool
//! listing, and direct tool invocation. All agent failures arrive here
//! already converted to user-facing text; session failures map to 500s
//! with a detail string.

pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::Config;
use crate::session::ToolSession;

use types::{
    AgentChatRequest, AgentChatResponse, ErrorResponse, HealthResponse, ToolCallRequest,
    ToolCallResponse, ToolsResponse,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub session: Arc<ToolSession>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agent/chat", post(agent_chat))
        .route("/api/agent/tools", get(list_tools))
        .route("/api/agent/tools/call", post(call_tool))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server. Runs until interrupted, then closes the tool
/// session before returning.
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let session = Arc::clone(&state.session);
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    session.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

// ── Handlers ──────────────────────────────────────────────────────

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn agent_chat(
    State(state): State<AppState>,
    Json(request): Json<AgentChatRequest>,
) -> Json<AgentChatResponse> {
    let request_id = Uuid::new_v4();
    info!(%request_id, "Agent chat request");

    // run_chat never fails; every failure mode is already a reply.
    let reply = state.agent.run_chat(&request.message).await;

    Json(AgentChatResponse { reply })
}

async fn list_tools(
    State(state): State<AppState>,
) -> Result<Json<ToolsResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.session.list_tools().await {
        Ok(tools) => Ok(Json(ToolsResponse { tools })),
        Err(e) => {
            error!("tools/list failed: {}", e);
            Err(internal_error(e.to_string()))
        }
    }
}

async fn call_tool(
    State(state): State<AppState>,
    Json(request): Json<ToolCallRequest>,
) -> Result<Json<ToolCallResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state
        .session
        .call_tool(&request.name, request.arguments)
        .await
    {
        Ok(result) => Ok(Json(ToolCallResponse { result })),
        Err(e) => {
            error!("tools/call '{}' failed: {}", request.name, e);
            Err(internal_error(e.to_string()))
        }
    }
}

fn internal_error(detail: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { detail }),
    )
}
