//! Hub error types.

use presence_core::error::AppError;

/// Failures reported by the connection hub.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The user has no live connection, or it was just evicted.
    #[error("User not connected or unreachable: {0}")]
    NotConnected(String),

    /// A live connection exists and the hub refuses a second one.
    #[error("User already connected: {0}")]
    AlreadyConnected(String),
}

impl From<HubError> for AppError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::NotConnected(_) => AppError::not_found("User not connected or unreachable"),
            HubError::AlreadyConnected(_) => {
                AppError::conflict("Another connection for this user is already active")
            }
        }
    }
}
