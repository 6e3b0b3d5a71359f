//! Route definitions for the presence hub HTTP API.
//!
//! REST routes are mounted under `/api`; the WebSocket endpoint lives at
//! `/ws`. Everything except the health checks sits behind the access gate.

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::middleware::cors::build_cors_layer;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let gate = axum_middleware::from_fn_with_state(state.clone(), middleware::auth::require_auth);

    let api_routes = Router::new()
        .merge(user_routes())
        .merge(chat_routes())
        .route_layer(gate.clone())
        .merge(health_routes());

    let ws_routes = Router::new()
        .route("/ws", get(handlers::ws::ws_upgrade))
        .route_layer(gate);

    let cors = build_cors_layer(&state.config.server.cors);

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Caller identity
fn user_routes() -> Router<AppState> {
    Router::new().route("/user/me", get(handlers::user::me))
}

/// Presence listing and direct messages
fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/active-users", get(handlers::chat::active_users))
        .route("/chat/send", post(handlers::chat::send_message))
}

/// Health checks (no authentication)
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use presence_auth::{InMemoryKeySource, KeyCache, KeySetDocument, KeySource, TokenValidator};
    use presence_core::config::AppConfig;
    use presence_realtime::ConnectionHub;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let mut config = AppConfig::default();
        config.auth.tenant_id = "contoso".to_string();
        config.auth.client_id = "client".to_string();

        let source = Arc::new(InMemoryKeySource::new(KeySetDocument::default()));
        let keys = Arc::new(KeyCache::new(
            source as Arc<dyn KeySource>,
            Duration::from_secs(3600),
        ));
        let validator = Arc::new(TokenValidator::new(&config.auth, keys));
        let hub = Arc::new(ConnectionHub::new(config.realtime.clone()));

        build_router(AppState::new(Arc::new(config), validator, hub))
    }

    async fn status_of(uri: &str) -> StatusCode {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_routes_are_public() {
        assert_eq!(status_of("/api/health").await, StatusCode::OK);
        assert_eq!(status_of("/api/health/detailed").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        assert_eq!(status_of("/api/user/me").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("/api/chat/active-users").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("/ws").await, StatusCode::UNAUTHORIZED);
    }
}
