//! Presence listing and direct messaging handlers.

use axum::Json;
use axum::extract::State;
use tracing::info;

use presence_core::error::AppError;
use presence_realtime::OutboundMessage;

use crate::dto::request::SendMessageRequest;
use crate::dto::response::{ActiveUsersResponse, SendMessageResponse};
use crate::extractors::{AuthUser, ValidatedJson};
use crate::state::AppState;

/// GET /api/chat/active-users
pub async fn active_users(State(state): State<AppState>, _caller: AuthUser) -> Json<ActiveUsersResponse> {
    let users = state.hub.list_active().await;
    Json(ActiveUsersResponse {
        count: users.len(),
        users,
    })
}

/// POST /api/chat/send
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(sender): AuthUser,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let message = OutboundMessage::Chat {
        from: sender.subject_id.clone(),
        name: sender.name.clone(),
        email: sender.email.clone(),
        content: req.content,
    };

    state.hub.send_to_user(&req.to, message).await?;

    info!(from = %sender.subject_id, to = %req.to, "Message sent");

    Ok(Json(SendMessageResponse {
        success: true,
        message: "Message sent".to_string(),
    }))
}
