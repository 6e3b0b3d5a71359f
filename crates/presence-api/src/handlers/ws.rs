//! WebSocket upgrade handler.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::StreamExt;
use tracing::{debug, info, warn};

use presence_auth::Identity;
use presence_core::config::DuplicatePolicy;
use presence_core::error::AppError;
use presence_realtime::{Connection, HubError, UserProfile};

use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /ws (behind the access gate)
pub async fn ws_upgrade(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if state.hub.config().duplicate_policy == DuplicatePolicy::RejectNew
        && state.hub.is_connected(&identity.subject_id).await
    {
        return Err(HubError::AlreadyConnected(identity.subject_id).into());
    }

    Ok(ws.on_upgrade(move |socket| handle_ws_connection(state, identity, socket)))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(state: AppState, identity: Identity, mut socket: WebSocket) {
    let (handle, outbound) = match state.hub.register(UserProfile::from(&identity)).await {
        Ok(registered) => registered,
        Err(e) => {
            warn!(subject_id = %identity.subject_id, error = %e, "WebSocket registration refused");
            if let Err(e) = socket.send(Message::Close(None)).await {
                debug!(error = %e, "Close frame write failed");
            }
            return;
        }
    };

    info!(
        conn_id = %handle.id,
        subject_id = %identity.subject_id,
        name = %identity.name,
        "WebSocket connection established"
    );

    let (sink, stream) = socket.split();
    Connection::new(&state.hub, handle, outbound)
        .run(sink, stream)
        .await;
}
