//! `requestSuggestions`: ask the artifact model for sentence-level edits to
//! a document and attach them to its latest version.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use rc_domain::tool::{Message, ToolDefinition};
use rc_providers::{ChatRequest, ModelCatalog};
use rc_store::{Store, Suggestion};

use super::{parse_args, Tool, ToolContext, REQUEST_SUGGESTIONS};
use crate::runtime::prompts::SUGGESTIONS_PROMPT;

const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionsInput {
    document_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftSuggestion {
    original_sentence: String,
    suggested_sentence: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftReply {
    #[serde(default)]
    suggestions: Vec<DraftSuggestion>,
}

/// Parse the model's JSON reply, tolerating a surrounding code fence.
fn parse_reply(content: &str) -> Result<Vec<DraftSuggestion>> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    let reply: DraftReply =
        serde_json::from_str(body.trim()).context("suggestions reply was not valid JSON")?;
    Ok(reply
        .suggestions
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .collect())
}

pub struct RequestSuggestionsTool {
    store: Arc<Store>,
    catalog: Arc<ModelCatalog>,
}

impl RequestSuggestionsTool {
    pub fn new(store: Arc<Store>, catalog: Arc<ModelCatalog>) -> Self {
        Self { store, catalog }
    }
}

#[async_trait::async_trait]
impl Tool for RequestSuggestionsTool {
    fn spec(&self) -> ToolDefinition {
        ToolDefinition {
            name: REQUEST_SUGGESTIONS.into(),
            description: "Request suggestions for a document".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "documentId": {
                        "type": "string",
                        "description": "The ID of the document to request edits"
                    }
                },
                "required": ["documentId"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let input: SuggestionsInput = parse_args(args)?;

        // Another user's document reads as missing.
        let Some(document) = self
            .store
            .documents
            .get_document_by_id(input.document_id)
            .filter(|d| d.user_id == ctx.session.user_id)
        else {
            return Ok(json!({ "error": "Document not found" }));
        };
        let Some(content) = document.content.as_deref().filter(|c| !c.is_empty()) else {
            return Ok(json!({ "error": "Document has no content to review" }));
        };

        let model = self.catalog.artifact_model()?;
        let mut req = ChatRequest::new(
            &model.model,
            vec![Message::system(SUGGESTIONS_PROMPT), Message::user(content)],
        );
        req.json_mode = true;
        let reply = model.provider.chat(&req).await?;
        let drafts = parse_reply(&reply.content)?;

        let mut saved = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let suggestion = Suggestion {
                id: Uuid::new_v4(),
                document_id: document.id,
                document_created_at: document.created_at,
                original_text: draft.original_sentence,
                suggested_text: draft.suggested_sentence,
                description: draft.description,
                is_resolved: false,
                user_id: ctx.session.user_id.clone(),
                created_at: Utc::now(),
            };
            ctx.writer
                .transient("suggestion", serde_json::to_value(&suggestion)?)
                .await;
            saved.push(suggestion);
        }

        let count = saved.len();
        if !saved.is_empty() {
            self.store.documents.save_suggestions(saved)?;
        }
        tracing::debug!(document_id = %document.id, count, "suggestions added");

        Ok(json!({
            "id": document.id,
            "title": document.title,
            "kind": document.kind.as_str(),
            "message": "Suggestions have been added to the document",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_parsing_caps_and_unfences() {
        let items: Vec<Value> = (0..7)
            .map(|i| {
                json!({
                    "originalSentence": format!("s{i}"),
                    "suggestedSentence": format!("t{i}"),
                    "description": "tighter"
                })
            })
            .collect();
        let raw = format!("```json\n{}\n```", json!({ "suggestions": items }));
        let parsed = parse_reply(&raw).unwrap();
        assert_eq!(parsed.len(), MAX_SUGGESTIONS);
        assert_eq!(parsed[0].original_sentence, "s0");
        assert_eq!(parsed[4].suggested_sentence, "t4");
    }

    #[test]
    fn reply_without_suggestions_is_empty() {
        assert!(parse_reply("{}").unwrap().is_empty());
        assert!(parse_reply("not json").is_err());
    }
}
