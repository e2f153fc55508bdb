//! Shared harness for gateway integration tests: a scripted model
//! provider, an app wired around it on a temporary store, and helpers to
//! drive the router and read UI message streams.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use rc_domain::config::Config;
use rc_domain::stream::{BoxStream, StreamEvent, Usage};
use rc_domain::{Error, Result};
use rc_gateway::api;
use rc_gateway::bootstrap::build_app_state_with;
use rc_gateway::state::AppState;
use rc_providers::{ChatRequest, ChatResponse, LlmProvider, ProviderRegistry};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub enum Script {
    Events(Vec<StreamEvent>),
    Fail(String),
}

/// Answers `chat_stream` calls from a queue of scripts, in order. `chat`
/// calls in JSON mode take the next queued JSON reply; other `chat` calls
/// (title generation) get a fixed reply.
pub struct MockProvider {
    scripts: Mutex<VecDeque<Script>>,
    json_replies: Mutex<VecDeque<String>>,
    title_reply: String,
    stream_requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            json_replies: Mutex::new(VecDeque::new()),
            title_reply: "\"Weather in Paris\"".into(),
            stream_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    pub fn push_json_reply(&self, reply: Value) {
        self.json_replies.lock().push_back(reply.to_string());
    }

    pub fn push_text(&self, chunks: &[&str], usage: Usage) {
        let mut events: Vec<StreamEvent> = chunks
            .iter()
            .map(|t| StreamEvent::Token {
                text: (*t).to_string(),
            })
            .collect();
        events.push(done(Some(usage)));
        self.push(Script::Events(events));
    }

    pub fn stream_requests(&self) -> Vec<ChatRequest> {
        self.stream_requests.lock().clone()
    }
}

pub fn done(usage: Option<Usage>) -> StreamEvent {
    StreamEvent::Done {
        usage,
        finish_reason: Some("stop".into()),
    }
}

pub fn usage(prompt: u32, completion: u32) -> Usage {
    Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
        ..Usage::default()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let json_reply = if req.json_mode {
            self.json_replies.lock().pop_front()
        } else {
            None
        };
        Ok(ChatResponse {
            content: json_reply.unwrap_or_else(|| self.title_reply.clone()),
            tool_calls: Vec::new(),
            usage: None,
            model: req.model.clone().unwrap_or_default(),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.stream_requests.lock().push(req.clone());
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::Events(vec![StreamEvent::Token { text: "ok".into() }, done(None)]));
        match script {
            Script::Events(events) => Ok(Box::pin(futures_util::stream::iter(
                events.into_iter().map(Ok),
            ))),
            Script::Fail(message) => Err(Error::Provider {
                provider: "mock".into(),
                message,
            }),
        }
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// App harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub provider: Arc<MockProvider>,
    _dir: tempfile::TempDir,
}

/// Defaults pointed at the mock provider, pricing lookups off.
pub fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.store.path = dir.join("data");
    config.llm.catalog_url = String::new();
    for model in &mut config.models.chat {
        model.provider = "mock".into();
    }
    config.models.title.provider = "mock".into();
    config.models.artifact.provider = "mock".into();
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        tweak(&mut config);

        let provider = Arc::new(MockProvider::new());
        let mut registry = ProviderRegistry::default();
        registry.insert("mock", provider.clone());

        let state = build_app_state_with(Arc::new(config), registry).unwrap();
        let router = api::router().with_state(state.clone());
        Self {
            state,
            router,
            provider,
            _dir: dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn guest_token(&self) -> String {
        let resp = self.request("POST", "/api/auth/guest", None, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        json_body(resp).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// A guest token and the guest's user id.
    pub async fn guest(&self) -> (String, String) {
        let resp = self.request("POST", "/api/auth/guest", None, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    pub async fn post_chat(&self, token: Option<&str>, body: Value) -> Response {
        self.request("POST", "/api/chat", token, Some(body)).await
    }
}

pub fn chat_body(chat_id: Uuid, text: &str) -> Value {
    json!({
        "id": chat_id,
        "message": {
            "id": Uuid::new_v4(),
            "role": "user",
            "parts": [{ "type": "text", "text": text }]
        },
        "selectedChatModel": "chat-model",
        "selectedVisibilityType": "private"
    })
}

pub async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Decode an SSE body into its JSON chunks. The second value tells
/// whether the terminating `[DONE]` was seen.
pub async fn sse_chunks(resp: Response) -> (Vec<Value>, bool) {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let mut chunks = Vec::new();
    let mut done = false;
    for line in text.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim_start();
        if data == "[DONE]" {
            done = true;
        } else {
            chunks.push(serde_json::from_str(data).unwrap());
        }
    }
    (chunks, done)
}

/// The output of the first `tool-output-available` chunk.
pub fn tool_output(chunks: &[Value]) -> Value {
    chunks
        .iter()
        .find(|c| c["type"] == "tool-output-available")
        .map(|c| c["output"].clone())
        .unwrap_or(Value::Null)
}

pub fn chunk_types(chunks: &[Value]) -> Vec<String> {
    chunks
        .iter()
        .map(|c| c["type"].as_str().unwrap_or_default().to_string())
        .collect()
}
