use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::model::SessionSummary;
use crate::server::{websocket_listener, RelayEngine};

pub fn create_relay_route(engine: RelayEngine) -> Router {
    Router::new()
        .route("/session", get(session_socket))
        .route("/health", get(health))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:session_id", get(session_detail))
        .with_state(engine)
}

async fn session_socket(
    State(engine): State<RelayEngine>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    websocket_listener::handle_websocket(ws, engine).await
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    active_sessions: usize,
    total_connections: usize,
    uptime: f64,
    timestamp: DateTime<Utc>,
}

async fn health(State(engine): State<RelayEngine>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        active_sessions: engine.active_sessions().await,
        total_connections: engine.connection_count().await,
        uptime: engine.uptime().as_secs_f64(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionListResponse {
    sessions: Vec<SessionSummary>,
    total_sessions: usize,
    total_connections: usize,
}

async fn list_sessions(State(engine): State<RelayEngine>) -> Json<SessionListResponse> {
    let sessions = engine.session_summaries().await;
    Json(SessionListResponse {
        total_sessions: sessions.len(),
        total_connections: engine.connection_count().await,
        sessions,
    })
}

async fn session_detail(
    State(engine): State<RelayEngine>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match engine.session_detail(&session_id).await {
        Some(detail) => Json(detail).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Session not found"})),
        )
            .into_response(),
    }
}
