//! Response DTOs.

use presence_realtime::{MetricsSnapshot, UserProfile};
use serde::{Deserialize, Serialize};

/// Active users listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveUsersResponse {
    /// Connected users.
    pub users: Vec<UserProfile>,
    /// Number of connected users.
    pub count: usize,
}

/// Outcome of a direct message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    /// Always `true` on a 200.
    pub success: bool,
    /// Message.
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Version.
    pub version: String,
}

/// Detailed health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// Overall status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
    /// Open WebSocket connections.
    pub ws_connections: usize,
    /// Distinct users online.
    pub online_users: usize,
    /// Signing keys currently cached.
    pub keys_cached: usize,
    /// Hub counters.
    pub hub: MetricsSnapshot,
}
