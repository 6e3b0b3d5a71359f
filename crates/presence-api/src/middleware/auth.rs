//! Access gate: validates the caller's token before protected handlers run.

use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use presence_core::error::AppError;

use crate::dto::request::WsQuery;
use crate::state::AppState;

/// Middleware that rejects requests without a valid bearer token.
///
/// The token comes from `Authorization: Bearer <token>`. WebSocket upgrade
/// requests may instead pass it as the `token` query parameter. On success
/// the caller's `Identity` is stored in the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(&request)
        .ok_or_else(|| AppError::unauthorized("Missing or invalid Authorization header"))?;

    let identity = state.validator.validate(&token).await.map_err(|e| {
        debug!(
            path = %request.uri().path(),
            error = %e,
            "Token rejected"
        );
        AppError::from(e)
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Finds the token a request authenticates with.
fn request_token(request: &Request) -> Option<String> {
    if let Some(token) = bearer_token(request.headers()) {
        return Some(token.to_string());
    }

    if !is_websocket_upgrade(request.headers()) {
        return None;
    }

    Query::<WsQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.token)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Extracts the token from an `Authorization: Bearer` header.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}
