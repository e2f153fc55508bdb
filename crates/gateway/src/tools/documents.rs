//! Artifact tools: `createDocument` and `updateDocument`.
//!
//! Both stream the generated content to the client as transient data parts
//! (`kind`, `id`, `title`, `clear`, then `textDelta`/`codeDelta`/`sheetDelta`,
//! then `finish`) and save a new version of the document when done.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use rc_domain::stream::StreamEvent;
use rc_domain::tool::{Message, ToolDefinition};
use rc_providers::{ChatRequest, ModelCatalog, ResolvedModel};
use rc_store::{Document, DocumentKind, Store};

use super::{parse_args, Tool, ToolContext, CREATE_DOCUMENT, UPDATE_DOCUMENT};
use crate::runtime::prompts;

fn delta_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Text => "textDelta",
        DocumentKind::Code => "codeDelta",
        DocumentKind::Sheet => "sheetDelta",
    }
}

/// Stream a generated artifact to the client and return the full content.
/// Text deltas are incremental; code and sheet deltas carry the whole draft
/// so far, since the client replaces those editors wholesale.
pub(crate) async fn stream_artifact(
    model: &ResolvedModel,
    system: &str,
    prompt: &str,
    kind: DocumentKind,
    ctx: &ToolContext,
) -> Result<String> {
    let req = ChatRequest::new(
        &model.model,
        vec![Message::system(system), Message::user(prompt)],
    );
    let mut events = model.provider.chat_stream(&req).await?;
    let mut content = String::new();

    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::Token { text } => {
                content.push_str(&text);
                let delta = match kind {
                    DocumentKind::Text => text,
                    DocumentKind::Code | DocumentKind::Sheet => content.clone(),
                };
                ctx.writer
                    .transient(delta_name(kind), Value::String(delta))
                    .await;
            }
            StreamEvent::Error { message } => anyhow::bail!(message),
            StreamEvent::Done { .. } => break,
            _ => {}
        }
    }
    Ok(content)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// createDocument
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct CreateInput {
    title: String,
    kind: DocumentKind,
}

pub struct CreateDocumentTool {
    store: Arc<Store>,
    catalog: Arc<ModelCatalog>,
}

impl CreateDocumentTool {
    pub fn new(store: Arc<Store>, catalog: Arc<ModelCatalog>) -> Self {
        Self { store, catalog }
    }
}

#[async_trait::async_trait]
impl Tool for CreateDocumentTool {
    fn spec(&self) -> ToolDefinition {
        ToolDefinition {
            name: CREATE_DOCUMENT.into(),
            description: "Create a document for a writing or content creation activities. \
                          This tool will call other functions that will generate the contents \
                          of the document based on the title and kind."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "kind": { "type": "string", "enum": ["text", "code", "sheet"] }
                },
                "required": ["title", "kind"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let input: CreateInput = parse_args(args)?;
        let id = Uuid::new_v4();
        let model = self.catalog.artifact_model()?;

        ctx.writer.transient("kind", json!(input.kind.as_str())).await;
        ctx.writer.transient("id", json!(id)).await;
        ctx.writer.transient("title", json!(input.title)).await;
        ctx.writer.transient("clear", Value::Null).await;

        let content = stream_artifact(
            &model,
            prompts::create_document_prompt(input.kind),
            &input.title,
            input.kind,
            ctx,
        )
        .await?;

        self.store.documents.save_document(Document {
            id,
            created_at: Utc::now(),
            title: input.title.clone(),
            content: Some(content),
            kind: input.kind,
            user_id: ctx.session.user_id.clone(),
        })?;

        ctx.writer.transient("finish", Value::Null).await;
        tracing::debug!(document_id = %id, kind = input.kind.as_str(), "document created");

        Ok(json!({
            "id": id,
            "title": input.title,
            "kind": input.kind.as_str(),
            "content": "A document was created and is now visible to the user.",
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// updateDocument
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct UpdateInput {
    id: Uuid,
    description: String,
}

pub struct UpdateDocumentTool {
    store: Arc<Store>,
    catalog: Arc<ModelCatalog>,
}

impl UpdateDocumentTool {
    pub fn new(store: Arc<Store>, catalog: Arc<ModelCatalog>) -> Self {
        Self { store, catalog }
    }
}

#[async_trait::async_trait]
impl Tool for UpdateDocumentTool {
    fn spec(&self) -> ToolDefinition {
        ToolDefinition {
            name: UPDATE_DOCUMENT.into(),
            description: "Update a document with the given description.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "description": "The ID of the document to update" },
                    "description": {
                        "type": "string",
                        "description": "The description of changes that need to be made"
                    }
                },
                "required": ["id", "description"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let input: UpdateInput = parse_args(args)?;

        // Another user's document reads as missing.
        let Some(current) = self
            .store
            .documents
            .get_document_by_id(input.id)
            .filter(|d| d.user_id == ctx.session.user_id)
        else {
            return Ok(json!({ "error": "Document not found" }));
        };
        let model = self.catalog.artifact_model()?;

        ctx.writer.transient("clear", json!(current.title)).await;

        let system = prompts::update_document_prompt(current.content.as_deref(), current.kind);
        let content =
            stream_artifact(&model, &system, &input.description, current.kind, ctx).await?;

        self.store.documents.save_document(Document {
            id: current.id,
            created_at: Utc::now(),
            title: current.title.clone(),
            content: Some(content),
            kind: current.kind,
            user_id: ctx.session.user_id.clone(),
        })?;

        ctx.writer.transient("finish", Value::Null).await;
        tracing::debug!(document_id = %current.id, "document updated");

        Ok(json!({
            "id": current.id,
            "title": current.title,
            "kind": current.kind.as_str(),
            "content": "The document has been updated successfully.",
        }))
    }
}
