//! Health check handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// Service name reported by health checks.
pub const SERVICE_NAME: &str = "presence-hub";

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/health/detailed
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let ws_connections = state.hub.connection_count().await;
    let online_users = state.hub.list_active().await.len();
    let keys_cached = state.validator.key_cache().len();

    Json(DetailedHealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        ws_connections,
        online_users,
        keys_cached,
        hub: state.hub.metrics().snapshot(),
    })
}
