//! Tools the chat model can call.
//!
//! Each tool advertises a JSON-schema definition and runs against a
//! [`ToolContext`] that carries the caller's session, the chat and the
//! response stream writer (artifact tools stream their content through it).

pub mod documents;
pub mod search;
pub mod suggestions;
pub mod weather;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use rc_domain::config::Config;
use rc_domain::tool::{ToolCall, ToolDefinition};
use rc_domain::trace::TraceEvent;
use rc_providers::ModelCatalog;
use rc_store::Store;

use crate::runtime::ui_stream::UiStreamWriter;
use crate::session::Session;

pub const GET_WEATHER: &str = "getWeather";
pub const CREATE_DOCUMENT: &str = "createDocument";
pub const UPDATE_DOCUMENT: &str = "updateDocument";
pub const REQUEST_SUGGESTIONS: &str = "requestSuggestions";
pub const VALYU_SEARCH: &str = "valyuSearch";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-call context.
#[derive(Clone)]
pub struct ToolContext {
    pub session: Session,
    pub chat_id: Uuid,
    pub writer: UiStreamWriter,
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolDefinition;

    /// Run the tool. `Err` becomes a `tool-output-error` part; expected
    /// failures the model should see (missing document, search outage) are
    /// returned as `Ok` values with an `error` field.
    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value>;
}

/// Deserialize tool arguments into their typed input.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| anyhow::anyhow!("invalid tool input: {e}"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its spec name. Returns self for chaining.
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        let name = tool.spec().name;
        self.tools.insert(name, tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions of the active tools, in the order given.
    pub fn definitions(&self, active: &[String]) -> Vec<ToolDefinition> {
        active
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.spec())
            .collect()
    }

    /// Run one tool call. Calls to tools outside the active set fail
    /// without running anything.
    pub async fn invoke(
        &self,
        ctx: &ToolContext,
        active: &[String],
        call: &ToolCall,
    ) -> std::result::Result<Value, String> {
        let tool = match self.tools.get(&call.tool_name) {
            Some(tool) if active.iter().any(|n| n == &call.tool_name) => tool,
            _ => {
                tracing::warn!(tool = %call.tool_name, "model called an unavailable tool");
                return Err(format!("Tool `{}` is not available", call.tool_name));
            }
        };

        let started = Instant::now();
        let result = tool.call(ctx, call.arguments.clone()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        TraceEvent::ToolInvoked {
            chat_id: ctx.chat_id.to_string(),
            tool_name: call.tool_name.clone(),
            ok: result.is_ok(),
            duration_ms,
        }
        .emit();

        result.map_err(|e| {
            tracing::warn!(tool = %call.tool_name, error = %e, "tool call failed");
            e.to_string()
        })
    }
}

/// Tools the model may use for a turn. Reasoning models get none.
pub fn active_tools(reasoning_model: bool, search_enabled: bool) -> Vec<String> {
    if reasoning_model {
        return Vec::new();
    }
    let mut active: Vec<String> = [GET_WEATHER, CREATE_DOCUMENT, UPDATE_DOCUMENT, REQUEST_SUGGESTIONS]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if search_enabled {
        active.push(VALYU_SEARCH.to_string());
    }
    active
}

/// Build the registry with every built-in tool.
pub fn build_default_registry(
    config: &Config,
    store: Arc<Store>,
    catalog: Arc<ModelCatalog>,
) -> Result<ToolRegistry> {
    Ok(ToolRegistry::new()
        .register(Arc::new(weather::WeatherTool::new(&config.weather)?))
        .register(Arc::new(documents::CreateDocumentTool::new(
            store.clone(),
            catalog.clone(),
        )))
        .register(Arc::new(documents::UpdateDocumentTool::new(
            store.clone(),
            catalog.clone(),
        )))
        .register(Arc::new(suggestions::RequestSuggestionsTool::new(
            store, catalog,
        )))
        .register(Arc::new(search::SearchTool::new(&config.search)?)))
}
