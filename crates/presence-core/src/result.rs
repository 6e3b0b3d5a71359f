//! Convenience result type alias for the presence hub.

use crate::error::AppError;

/// A specialized `Result` type for presence hub operations.
///
/// Defined so that every crate does not need to write
/// `Result<T, AppError>` explicitly.
pub type AppResult<T> = Result<T, AppError>;
