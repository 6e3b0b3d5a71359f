//! Outbound WebSocket message type definitions.

use serde::{Deserialize, Serialize};

/// Events pushed from the server to a client.
///
/// Serialized as `{"type": "<tag>", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Point-to-point chat message.
    Chat {
        /// Sender's subject id.
        from: String,
        /// Sender's display name.
        name: String,
        /// Sender's email.
        email: String,
        /// Message text.
        content: String,
    },
    /// A user came online.
    UserJoined {
        /// Subject id.
        user_id: String,
        /// Display name.
        name: String,
        /// Email.
        email: String,
    },
    /// A user went offline.
    UserLeft {
        /// Subject id.
        user_id: String,
        /// Display name.
        name: String,
        /// Email.
        email: String,
    },
}

impl OutboundMessage {
    /// The wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
        }
    }
}
