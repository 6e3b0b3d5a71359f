//! JSON body extractor that validates its payload.

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

use presence_core::error::AppError;

/// Like [`Json`], but malformed bodies and failed validation both become
/// `400 VALIDATION_ERROR` responses.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| AppError::validation(format!("Invalid request body: {}", rejection.body_text())))?;

        value.validate().map_err(|errors| {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .collect::<Vec<_>>()
                .join("; ");
            AppError::validation(if message.is_empty() {
                "Invalid request body".to_string()
            } else {
                message
            })
        })?;

        Ok(Self(value))
    }
}
