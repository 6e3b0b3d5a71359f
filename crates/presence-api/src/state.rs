//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use presence_auth::TokenValidator;
use presence_core::config::AppConfig;
use presence_realtime::ConnectionHub;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Token validator (owns the signing key cache)
    pub validator: Arc<TokenValidator>,
    /// Connection hub
    pub hub: Arc<ConnectionHub>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Creates the state from its components.
    pub fn new(config: Arc<AppConfig>, validator: Arc<TokenValidator>, hub: Arc<ConnectionHub>) -> Self {
        Self {
            config,
            validator,
            hub,
            started_at: Instant::now(),
        }
    }
}
