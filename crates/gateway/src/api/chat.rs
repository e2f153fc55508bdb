//! Chat endpoints: send a message, delete, read, change visibility and
//! resume a response stream.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use rc_domain::message::{ChatMessage, MessagePart, UiRole, Visibility};
use rc_providers::ModelCatalog;
use rc_store::{Chat, DbMessage};

use super::error::{ChatError, ErrorType, Surface};
use super::{parse_id, require_session};
use crate::runtime::entitlements::check_message_allowance;
use crate::runtime::hints::RequestHints;
use crate::runtime::title::{spawn_title_generation, PLACEHOLDER_TITLE};
use crate::runtime::ui_stream::{receiver_stream, sse_response};
use crate::runtime::{prompts, start_chat_turn, ChatTurnInput};
use crate::session::MaybeSession;
use crate::state::AppState;
use crate::tools;

const MAX_TEXT_CHARS: usize = 2000;
const MAX_FILE_NAME_CHARS: usize = 100;
const ALLOWED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Provider message that means the hosted gateway has no billing set up.
const CREDIT_CARD_MARKER: &str = "requires a valid credit card";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request body
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequestBody {
    pub id: Uuid,
    pub message: ChatMessage,
    pub selected_chat_model: String,
    pub selected_visibility_type: Visibility,
    #[serde(default)]
    pub enable_valyu_search: bool,
}

impl PostRequestBody {
    /// Checks serde cannot express: user role, part kinds and sizes, and a
    /// model id the catalog knows.
    pub fn validate(&self, catalog: &ModelCatalog) -> Result<(), String> {
        if self.message.role != UiRole::User {
            return Err("message.role must be \"user\"".into());
        }
        if self.message.parts.is_empty() {
            return Err("message.parts must not be empty".into());
        }
        for part in &self.message.parts {
            validate_part(part)?;
        }
        if !catalog.is_known(&self.selected_chat_model) {
            return Err(format!("unknown chat model `{}`", self.selected_chat_model));
        }
        Ok(())
    }
}

fn validate_part(part: &MessagePart) -> Result<(), String> {
    match part {
        MessagePart::Text { text } => {
            let len = text.chars().count();
            if len == 0 || len > MAX_TEXT_CHARS {
                return Err(format!("text parts must be 1..={MAX_TEXT_CHARS} characters"));
            }
        }
        MessagePart::File {
            media_type,
            name,
            url,
        } => {
            if !ALLOWED_MEDIA_TYPES.contains(&media_type.as_str()) {
                return Err(format!("unsupported media type `{media_type}`"));
            }
            let name_len = name.as_deref().map(|n| n.chars().count()).unwrap_or(0);
            if name_len == 0 || name_len > MAX_FILE_NAME_CHARS {
                return Err(format!("file names must be 1..={MAX_FILE_NAME_CHARS} characters"));
            }
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err("file url must be an http(s) URL".into());
            }
        }
        _ => return Err("only text and file parts may be sent".into()),
    }
    Ok(())
}

/// Failures before the response starts. A gateway billing error gets its
/// own code so the client can point the user at it.
fn pre_stream_error(e: rc_domain::Error) -> ChatError {
    let text = e.to_string();
    if text.contains(CREDIT_CARD_MARKER) {
        return ChatError::new(ErrorType::BadRequest, Surface::ActivateGateway);
    }
    tracing::error!(error = %text, "chat request failed before streaming");
    ChatError::new(ErrorType::Offline, Surface::Chat)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn post_chat(
    State(state): State<AppState>,
    session: MaybeSession,
    headers: HeaderMap,
    body: Result<Json<PostRequestBody>, JsonRejection>,
) -> Result<Response, ChatError> {
    let Json(body) =
        body.map_err(|e| ChatError::bad_request(Surface::Api).with_cause(e.body_text()))?;
    body.validate(&state.catalog)
        .map_err(|cause| ChatError::bad_request(Surface::Api).with_cause(cause))?;

    let session = require_session(session, Surface::Chat)?;
    check_message_allowance(&state.store, &state.config.entitlements, &session)?;

    // ── Load or create the chat ──────────────────────────────────────
    let user_message = DbMessage::from_ui(body.id, &body.message);
    let history = match state.store.chats.get_chat_by_id(body.id) {
        Some(chat) => {
            if chat.user_id != session.user_id {
                return Err(ChatError::forbidden(Surface::Chat));
            }
            let mut history: Vec<ChatMessage> = state
                .store
                .messages
                .get_messages_by_chat_id(body.id)?
                .iter()
                .map(DbMessage::to_ui)
                .collect();
            state.store.messages.save_messages(&[user_message])?;
            history.push(body.message.clone());
            history
        }
        None => {
            // The chat must exist before its first message.
            state.store.chats.save_chat(Chat {
                id: body.id,
                created_at: Utc::now(),
                title: PLACEHOLDER_TITLE.to_string(),
                user_id: session.user_id.clone(),
                visibility: body.selected_visibility_type,
                last_context: None,
            })?;
            state.store.messages.save_messages(&[user_message])?;
            spawn_title_generation(&state, body.id, body.message.clone());
            vec![body.message.clone()]
        }
    };

    // ── Model, prompt and tools ──────────────────────────────────────
    let model = state
        .catalog
        .chat_model(&body.selected_chat_model)
        .map_err(pre_stream_error)?;
    let hints = RequestHints::from_headers(&headers);
    let system = prompts::system_prompt(model.reasoning, &hints, body.enable_valyu_search);
    let active_tools = tools::active_tools(model.reasoning, body.enable_valyu_search);

    tracing::info!(
        chat_id = %body.id,
        model = %model.id,
        search = body.enable_valyu_search,
        tools = active_tools.len(),
        history = history.len(),
        "chat request accepted"
    );

    let rx = start_chat_turn(
        &state,
        ChatTurnInput {
            chat_id: body.id,
            session,
            model,
            history,
            system,
            active_tools,
        },
    )
    .await
    .map_err(pre_stream_error)?;

    Ok(sse_response(receiver_stream(rx)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /api/chat?id=
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatIdQuery {
    pub id: Option<String>,
}

pub async fn delete_chat(
    State(state): State<AppState>,
    session: MaybeSession,
    Query(query): Query<ChatIdQuery>,
) -> Result<Json<Chat>, ChatError> {
    let id = parse_id(query.id.as_deref(), "id")?;
    let session = require_session(session, Surface::Chat)?;

    match state.store.chats.get_chat_by_id(id) {
        Some(chat) if chat.user_id == session.user_id => {}
        _ => return Err(ChatError::forbidden(Surface::Chat)),
    }

    let deleted = state
        .store
        .delete_chat_by_id(id)?
        .ok_or_else(|| ChatError::forbidden(Surface::Chat))?;
    state.streams.remove_chat(id);
    tracing::info!(chat_id = %id, "chat deleted");
    Ok(Json(deleted))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/chat/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Load a chat the caller may read: public chats are open to everyone,
/// private chats only to their owner.
fn readable_chat(state: &AppState, session: &MaybeSession, id: Uuid) -> Result<Chat, ChatError> {
    let chat = state
        .store
        .chats
        .get_chat_by_id(id)
        .ok_or_else(|| ChatError::not_found(Surface::Chat))?;
    if chat.visibility == Visibility::Private {
        let session = session
            .0
            .as_ref()
            .ok_or_else(|| ChatError::unauthorized(Surface::Chat))?;
        if session.user_id != chat.user_id {
            return Err(ChatError::forbidden(Surface::Chat));
        }
    }
    Ok(chat)
}

pub async fn get_chat(
    State(state): State<AppState>,
    session: MaybeSession,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ChatError> {
    let id = parse_id(Some(&id), "id")?;
    let chat = readable_chat(&state, &session, id)?;
    let messages: Vec<ChatMessage> = state
        .store
        .messages
        .get_messages_by_chat_id(id)?
        .iter()
        .map(DbMessage::to_ui)
        .collect();
    Ok(Json(serde_json::json!({ "chat": chat, "messages": messages })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PATCH /api/chat/:id/visibility
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct VisibilityBody {
    pub visibility: Visibility,
}

pub async fn update_visibility(
    State(state): State<AppState>,
    session: MaybeSession,
    Path(id): Path<String>,
    body: Result<Json<VisibilityBody>, JsonRejection>,
) -> Result<Json<Chat>, ChatError> {
    let id = parse_id(Some(&id), "id")?;
    let Json(body) =
        body.map_err(|e| ChatError::bad_request(Surface::Api).with_cause(e.body_text()))?;
    let session = require_session(session, Surface::Chat)?;

    let chat = state
        .store
        .chats
        .get_chat_by_id(id)
        .ok_or_else(|| ChatError::not_found(Surface::Chat))?;
    if chat.user_id != session.user_id {
        return Err(ChatError::forbidden(Surface::Chat));
    }

    state
        .store
        .chats
        .update_chat_visibility_by_id(id, body.visibility)?;
    Ok(Json(Chat {
        visibility: body.visibility,
        ..chat
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/chat/:id/stream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Replay the chat's latest response stream and follow it while it runs.
/// 204 when the chat has no stream to resume.
pub async fn resume_stream(
    State(state): State<AppState>,
    session: MaybeSession,
    Path(id): Path<String>,
) -> Result<Response, ChatError> {
    let id = parse_id(Some(&id), "id")?;
    let session = require_session(session, Surface::Chat)?;

    let chat = state
        .store
        .chats
        .get_chat_by_id(id)
        .ok_or_else(|| ChatError::not_found(Surface::Chat))?;
    if chat.visibility == Visibility::Private && chat.user_id != session.user_id {
        return Err(ChatError::forbidden(Surface::Chat));
    }

    match state.streams.latest(id) {
        Some(live) => {
            tracing::debug!(chat_id = %id, stream_id = %live.id, "resuming stream");
            Ok(sse_response(live.replay()))
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
