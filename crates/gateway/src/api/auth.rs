//! Guest sign-in and session introspection.
//!
//! Regular-user tokens are minted out of band (`raisechat token issue`);
//! guests get a fresh identity per sign-in.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::error::{ChatError, Surface};
use super::require_session;
use crate::session::{session_cookie, MaybeSession, Session};
use crate::state::AppState;

fn user_json(session: &Session) -> serde_json::Value {
    json!({
        "id": session.user_id,
        "email": session.email,
        "type": session.user_type,
    })
}

/// `POST /api/auth/guest`: issue a guest session and set its cookie.
pub async fn guest(State(state): State<AppState>) -> Result<Response, ChatError> {
    if !state.config.auth.guest_enabled {
        return Err(ChatError::forbidden(Surface::Auth));
    }

    let (token, session) = state.sessions.issue_guest().map_err(|e| {
        tracing::error!(error = %e, "failed to issue guest token");
        ChatError::bad_request(Surface::Auth).with_cause(e.to_string())
    })?;
    tracing::info!(user_id = %session.user_id, "guest session issued");

    let cookie = session_cookie(&token, state.sessions.ttl());
    let body = json!({
        "token": token,
        "user": user_json(&session),
        "expires": session.expires_at,
    });
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// `GET /api/auth/session`: the caller's session.
pub async fn current_session(session: MaybeSession) -> Result<Json<serde_json::Value>, ChatError> {
    let session = require_session(session, Surface::Auth)?;
    Ok(Json(json!({
        "user": user_json(&session),
        "isGuest": session.is_guest(),
        "expires": session.expires_at,
    })))
}
