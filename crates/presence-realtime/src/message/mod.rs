//! WebSocket message types and frame encoding.

pub mod types;

use tracing::error;

pub use types::OutboundMessage;

/// Encodes a batch of messages as newline-separated JSON documents.
pub fn encode_batch(batch: &[OutboundMessage]) -> String {
    batch
        .iter()
        .filter_map(|msg| match serde_json::to_string(msg) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(kind = msg.kind(), error = %e, "Failed to serialize outbound message");
                None
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
