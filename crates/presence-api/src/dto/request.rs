//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Direct message request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    /// Recipient subject id.
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing 'to' field"))]
    pub to: String,
    /// Message text.
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing 'content' field"))]
    pub content: String,
}

/// Query string accepted on the WebSocket upgrade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsQuery {
    /// Bearer token for clients that cannot set headers.
    pub token: Option<String>,
}
