use serde::Serialize;

/// Structured trace events emitted across all RaiseChat crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ChatCreated {
        chat_id: String,
        user_id: String,
        visibility: String,
    },
    MessagesSaved {
        chat_id: String,
        count: usize,
    },
    RateLimited {
        user_id: String,
        user_type: String,
        count: usize,
        limit: usize,
    },
    LlmRequest {
        provider: String,
        model: String,
        step: usize,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ToolInvoked {
        chat_id: String,
        tool_name: String,
        ok: bool,
        duration_ms: u64,
    },
    UsageEnriched {
        chat_id: String,
        model_id: String,
        priced: bool,
        total_usd: Option<f64>,
    },
    TitleGenerated {
        chat_id: String,
        chars: usize,
    },
    StreamResumed {
        chat_id: String,
        stream_id: String,
        replayed: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "rc_event");
    }
}
