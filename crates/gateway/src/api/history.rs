//! Chat history: paginated listing and bulk delete for the sidebar.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use rc_store::ChatPage;

use super::error::{ChatError, Surface};
use super::{parse_id, require_session};
use crate::session::MaybeSession;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub starting_after: Option<String>,
    pub ending_before: Option<String>,
}

pub async fn list_history(
    State(state): State<AppState>,
    session: MaybeSession,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ChatPage>, ChatError> {
    if query.starting_after.is_some() && query.ending_before.is_some() {
        return Err(ChatError::bad_request(Surface::Api)
            .with_cause("Only one of starting_after or ending_before can be provided."));
    }
    let session = require_session(session, Surface::Chat)?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let starting_after = query
        .starting_after
        .as_deref()
        .map(|id| parse_id(Some(id), "starting_after"))
        .transpose()?;
    let ending_before = query
        .ending_before
        .as_deref()
        .map(|id| parse_id(Some(id), "ending_before"))
        .transpose()?;

    let page = state.store.chats.get_chats_by_user_id(
        &session.user_id,
        limit,
        starting_after,
        ending_before,
    )?;
    Ok(Json(page))
}

pub async fn delete_history(
    State(state): State<AppState>,
    session: MaybeSession,
) -> Result<Json<serde_json::Value>, ChatError> {
    let session = require_session(session, Surface::Chat)?;
    let deleted = state.store.delete_all_chats_by_user_id(&session.user_id)?;
    state.streams.remove_owner(&session.user_id);
    tracing::info!(user_id = %session.user_id, deleted, "chat history deleted");
    Ok(Json(serde_json::json!({ "deletedCount": deleted })))
}
