//! Chat titles, generated from the first user message in the background.

use std::time::Instant;

use uuid::Uuid;

use rc_domain::message::ChatMessage;
use rc_domain::tool::Message;
use rc_domain::trace::TraceEvent;
use rc_providers::{ChatRequest, ResolvedModel};

use super::prompts::TITLE_PROMPT;
use crate::state::AppState;

const MAX_TITLE_CHARS: usize = 80;

/// Title shown until the generated one lands.
pub const PLACEHOLDER_TITLE: &str = "New Chat";

pub async fn generate_title(
    model: &ResolvedModel,
    message: &ChatMessage,
) -> rc_domain::Result<String> {
    let prompt = serde_json::to_string(message)?;
    let req = ChatRequest::new(
        &model.model,
        vec![Message::system(TITLE_PROMPT), Message::user(prompt)],
    );

    let started = Instant::now();
    let resp = model.provider.chat(&req).await?;
    TraceEvent::LlmRequest {
        provider: model.provider.provider_id().to_string(),
        model: model.model.clone(),
        step: 0,
        streaming: false,
        duration_ms: started.elapsed().as_millis() as u64,
        prompt_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens),
        completion_tokens: resp.usage.as_ref().map(|u| u.completion_tokens),
    }
    .emit();

    Ok(clean_title(&resp.content))
}

/// Strip quotes and colons, collapse to one line and cap the length.
pub fn clean_title(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let stripped: String = line
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | ':' | '“' | '”'))
        .collect();
    let trimmed = stripped.trim();
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        return trimmed.to_string();
    }
    trimmed
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Generate and store a chat title without holding up the response.
pub fn spawn_title_generation(state: &AppState, chat_id: Uuid, message: ChatMessage) {
    let state = state.clone();
    tokio::spawn(async move {
        let title = match state.catalog.title_model() {
            Ok(model) => generate_title(&model, &message).await,
            Err(e) => Err(e),
        };
        let title = match title {
            Ok(t) if !t.is_empty() => t,
            Ok(_) => {
                tracing::warn!(%chat_id, "title model returned an empty title");
                return;
            }
            Err(e) => {
                tracing::warn!(%chat_id, error = %e, "title generation failed");
                return;
            }
        };

        if let Err(e) = state.store.chats.update_chat_title_by_id(chat_id, &title) {
            tracing::warn!(%chat_id, error = %e, "failed to store chat title");
            return;
        }
        TraceEvent::TitleGenerated {
            chat_id: chat_id.to_string(),
            chars: title.chars().count(),
        }
        .emit();
    });
}
