//! Caller identity handler.

use axum::Json;
use tracing::debug;

use presence_auth::Identity;

use crate::extractors::AuthUser;

/// GET /api/user/me
pub async fn me(AuthUser(identity): AuthUser) -> Json<Identity> {
    debug!(subject_id = %identity.subject_id, "User info retrieved");
    Json(identity)
}
