//! Real-time WebSocket engine configuration.

use serde::{Deserialize, Serialize};

/// What happens when a user opens a second connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The newest connection wins; the previous one is closed.
    #[default]
    ReplaceExisting,
    /// The new connection is refused while another one is live.
    RejectNew,
}

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound buffer.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Maximum queued messages coalesced into one WebSocket frame.
    #[serde(default = "default_max_batch")]
    pub max_batch_messages: usize,
    /// WebSocket ping interval in seconds (0 disables server pings).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Policy for a second connection from the same user.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Broadcast join/leave events to connected users.
    #[serde(default = "default_true")]
    pub announce_presence: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer_size: default_outbound_buffer(),
            max_batch_messages: default_max_batch(),
            ping_interval_seconds: default_ping_interval(),
            duplicate_policy: DuplicatePolicy::default(),
            announce_presence: true,
        }
    }
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_max_batch() -> usize {
    64
}

fn default_ping_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
