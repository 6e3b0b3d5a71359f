//! Authentication error types.

use jsonwebtoken::Algorithm;
use presence_core::error::AppError;

/// Reasons a token can be refused.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is not a well-formed JWT.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The header names an algorithm outside the RSA family.
    #[error("Unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    /// The header carries no `kid`.
    #[error("Token header missing 'kid' field")]
    MissingKeyId,

    /// No published key matches the header's `kid`.
    #[error("Unknown signing key: {0}")]
    KeyNotFound(String),

    /// The key set could not be retrieved or held no usable key.
    #[error("Key set fetch failed: {0}")]
    KeyFetch(String),

    /// The signature does not match the signing key.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The `iss` claim is not one of the accepted issuers.
    #[error("Invalid token issuer")]
    InvalidIssuer,

    /// The `aud` claim does not name this application.
    #[error("Invalid token audience")]
    InvalidAudience,

    /// The token is past its `exp`.
    #[error("Token has expired")]
    Expired,

    /// Any other rejection reported by the JWT library.
    #[error("Token rejected: {0}")]
    Rejected(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::InvalidAlgorithm => Self::Malformed("algorithm mismatch".to_string()),
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::Malformed(format!("missing required claim '{claim}'"))
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(err.to_string()),
            _ => Self::Rejected(err),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::KeyFetch(_) => AppError::with_source(
                presence_core::error::ErrorKind::Authentication,
                "Unable to verify token signature",
                err,
            ),
            other => AppError::unauthorized(other.to_string()),
        }
    }
}
