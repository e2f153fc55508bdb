//! Artifact documents and their suggestions.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use rc_store::{Document, DocumentKind, Suggestion};

use super::error::{ChatError, Surface};
use super::{parse_id, require_session};
use crate::session::{MaybeSession, Session};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub id: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveDocumentBody {
    pub content: String,
    pub title: String,
    pub kind: DocumentKind,
}

/// All versions of a document the caller owns, oldest first.
fn owned_versions(state: &AppState, session: &Session, id: Uuid) -> Result<Vec<Document>, ChatError> {
    let versions = state.store.documents.get_documents_by_id(id);
    match versions.first() {
        None => Err(ChatError::not_found(Surface::Document)),
        Some(doc) if doc.user_id != session.user_id => Err(ChatError::forbidden(Surface::Document)),
        Some(_) => Ok(versions),
    }
}

pub async fn get_document(
    State(state): State<AppState>,
    session: MaybeSession,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Vec<Document>>, ChatError> {
    let id = parse_id(query.id.as_deref(), "id")?;
    let session = require_session(session, Surface::Document)?;
    Ok(Json(owned_versions(&state, &session, id)?))
}

/// Save a new version. The first save creates the document.
pub async fn save_document(
    State(state): State<AppState>,
    session: MaybeSession,
    Query(query): Query<DocumentQuery>,
    body: Result<Json<SaveDocumentBody>, JsonRejection>,
) -> Result<Json<Document>, ChatError> {
    let id = parse_id(query.id.as_deref(), "id")?;
    let session = require_session(session, Surface::Document)?;
    let Json(body) =
        body.map_err(|e| ChatError::bad_request(Surface::Document).with_cause(e.body_text()))?;

    if let Some(existing) = state.store.documents.get_document_by_id(id) {
        if existing.user_id != session.user_id {
            return Err(ChatError::forbidden(Surface::Document));
        }
    }

    let document = Document {
        id,
        created_at: Utc::now(),
        title: body.title,
        content: Some(body.content),
        kind: body.kind,
        user_id: session.user_id,
    };
    state.store.documents.save_document(document.clone())?;
    tracing::debug!(document_id = %id, "document version saved");
    Ok(Json(document))
}

/// Drop every version newer than `timestamp`. Returns the removed versions.
pub async fn delete_document(
    State(state): State<AppState>,
    session: MaybeSession,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Vec<Document>>, ChatError> {
    let id = parse_id(query.id.as_deref(), "id")?;
    let timestamp = query
        .timestamp
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ChatError::bad_request(Surface::Api).with_cause("Parameter timestamp is required.")
        })?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|_| {
            ChatError::bad_request(Surface::Api)
                .with_cause("Parameter timestamp must be an RFC 3339 date.")
        })?
        .with_timezone(&Utc);
    let session = require_session(session, Surface::Document)?;

    owned_versions(&state, &session, id)?;
    let removed = state
        .store
        .documents
        .delete_documents_by_id_after_timestamp(id, timestamp)?;
    tracing::debug!(document_id = %id, removed = removed.len(), "document versions removed");
    Ok(Json(removed))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Suggestions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsQuery {
    pub document_id: Option<String>,
}

pub async fn list_suggestions(
    State(state): State<AppState>,
    session: MaybeSession,
    Query(query): Query<SuggestionsQuery>,
) -> Result<Json<Vec<Suggestion>>, ChatError> {
    let document_id = parse_id(query.document_id.as_deref(), "documentId")?;
    let session = require_session(session, Surface::Suggestions)?;

    let suggestions = state
        .store
        .documents
        .get_suggestions_by_document_id(document_id);
    if let Some(first) = suggestions.first() {
        if first.user_id != session.user_id {
            return Err(ChatError::forbidden(Surface::Api));
        }
    }
    Ok(Json(suggestions))
}
