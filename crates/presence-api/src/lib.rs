//! # presence-api
//!
//! HTTP API layer for the presence hub built on Axum.
//!
//! Provides the REST endpoints, the WebSocket upgrade, the access gate
//! middleware, extractors, DTOs, CORS and request logging.

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
