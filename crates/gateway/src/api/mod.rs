pub mod auth;
pub mod chat;
pub mod documents;
pub mod error;
pub mod history;
pub mod models;

use axum::routing::{get, patch, post};
use axum::Router;
use uuid::Uuid;

use crate::session::{MaybeSession, Session};
use crate::state::AppState;

use error::{ChatError, Surface};

/// Build the API router.
///
/// Every route is reachable without a token; handlers that need a user
/// check the session themselves so each surface reports its own
/// `unauthorized:<surface>` code.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(models::health))
        // Auth
        .route("/api/auth/guest", post(auth::guest))
        .route("/api/auth/session", get(auth::current_session))
        // Chat
        .route("/api/chat", post(chat::post_chat).delete(chat::delete_chat))
        .route("/api/chat/:id", get(chat::get_chat))
        .route("/api/chat/:id/visibility", patch(chat::update_visibility))
        .route("/api/chat/:id/stream", get(chat::resume_stream))
        // History
        .route(
            "/api/history",
            get(history::list_history).delete(history::delete_history),
        )
        // Artifacts
        .route(
            "/api/document",
            get(documents::get_document)
                .post(documents::save_document)
                .delete(documents::delete_document),
        )
        .route("/api/suggestions", get(documents::list_suggestions))
        // Models
        .route("/api/models", get(models::list_models))
        .route("/api/suggested-actions", get(models::suggested_actions))
}

/// The signed-in user, or `unauthorized:<surface>`.
pub(crate) fn require_session(
    session: MaybeSession,
    surface: Surface,
) -> Result<Session, ChatError> {
    session.0.ok_or_else(|| ChatError::unauthorized(surface))
}

/// Parse a required id parameter, or `bad_request:api`.
pub(crate) fn parse_id(raw: Option<&str>, name: &str) -> Result<Uuid, ChatError> {
    let raw = raw
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ChatError::bad_request(Surface::Api).with_cause(format!("Parameter {name} is required."))
        })?;
    Uuid::parse_str(raw).map_err(|_| {
        ChatError::bad_request(Surface::Api).with_cause(format!("Parameter {name} must be a UUID."))
    })
}
