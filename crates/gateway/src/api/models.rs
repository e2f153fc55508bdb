//! Model picker data, suggested prompts and health.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub selected: Option<String>,
}

/// `GET /api/models`: the chat models a client may select. `selected`
/// echoes a previously chosen id when it is still offered, the default
/// otherwise.
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Json<serde_json::Value> {
    let catalog = &state.catalog;
    let models: Vec<serde_json::Value> = catalog
        .models()
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "name": m.name,
                "description": m.description,
                "reasoning": m.reasoning,
            })
        })
        .collect();
    Json(json!({
        "default": catalog.default_id(),
        "selected": catalog.select(query.selected.as_deref()),
        "models": models,
    }))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedAction {
    pub title: &'static str,
    pub label: &'static str,
    pub action: &'static str,
    pub enable_valyu_search: bool,
}

const fn deep_search(title: &'static str, label: &'static str, action: &'static str) -> SuggestedAction {
    SuggestedAction {
        title,
        label,
        action,
        enable_valyu_search: true,
    }
}

pub const SUGGESTED_ACTIONS: [SuggestedAction; 4] = [
    deep_search(
        "SEC Filings Analysis",
        "Microsoft's AI strategy in 2024 filings",
        "Find mentions of AI strategy in Microsoft's 2024 SEC filings",
    ),
    deep_search(
        "Market Comparison",
        "Tesla vs GM and Ford over the past year",
        "Compare Tesla's stock performance against GM and Ford over the past year",
    ),
    deep_search(
        "Regulatory Impact",
        "EU AI Act and US AI orders on big tech",
        "Analyze how EU AI Act and US AI orders affect big tech",
    ),
    deep_search(
        "Funding Flows",
        "Development funds and UN tech programs",
        "Map international development funds and UN programs supporting tech",
    ),
];

/// `GET /api/suggested-actions`: starter prompts for an empty chat.
pub async fn suggested_actions() -> Json<Vec<SuggestedAction>> {
    Json(SUGGESTED_ACTIONS.to_vec())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "models": state.catalog.models().len(),
        "tools": state.tools.names(),
    }))
}
