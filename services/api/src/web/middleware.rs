//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::web::state::{AppState, SessionId};

/// Reads the `session` cookie and parses it as a session id.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("session="))
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Middleware that validates the session cookie and checks the session is logged in.
///
/// If valid, inserts the `SessionId` into request extensions for handlers to use.
/// If invalid, missing or logged out, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Parse session ID from cookie
    let session_id = session_id_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Look the session up and check the gate was passed
    let context = state.sessions.load(session_id).await.map_err(|e| {
        debug!("Rejected request for unknown session: {}", e);
        StatusCode::UNAUTHORIZED
    })?;
    if !context.logged_in {
        return Err(StatusCode::UNAUTHORIZED);
    }

    // 3. Insert the session into request extensions
    req.extensions_mut().insert(SessionId(session_id));

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
