//! OpenAI-compatible adapter.
//!
//! The hosted model gateway speaks the OpenAI chat-completions contract,
//! as do OpenAI itself, Ollama, vLLM and most self-hosted servers, so this
//! is the only wire format the gateway needs.

use std::collections::BTreeMap;

use crate::sse::{sse_response_stream, SseParser};
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use rc_domain::config::ProviderConfig;
use rc_domain::error::{Error, Result};
use rc_domain::stream::{BoxStream, StreamEvent, Usage};
use rc_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use serde_json::{json, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    /// Full header value (`Bearer sk-...`), absent for unauthenticated
    /// local endpoints.
    auth_value: Option<String>,
    auth_header: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &ProviderConfig, timeout_ms: u64) -> Result<Self> {
        let auth_value = match resolve_api_key(&cfg.auth)? {
            Some((key, source)) => {
                tracing::debug!(provider = %cfg.id, ?source, "resolved provider API key");
                let prefix = cfg.auth.prefix.as_deref().unwrap_or("Bearer ");
                Some(format!("{prefix}{key}"))
            }
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth_value,
            auth_header: cfg
                .auth
                .header
                .clone()
                .unwrap_or_else(|| "Authorization".into()),
            client,
        })
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(url).json(body);
        if let Some(value) = &self.auth_value {
            builder = builder.header(self.auth_header.as_str(), value.as_str());
        }
        builder
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let resp = self.post(body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.map_err(from_reqwest)?;
        Err(Error::Provider {
            provider: self.id.clone(),
            message: format!("HTTP {} - {}", status.as_u16(), upstream_message(&text)),
        })
    }
}

/// Prefer the `error.message` field of an error body over the raw text.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn build_chat_body(req: &ChatRequest, stream: bool) -> Value {
    let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();
    let mut body = json!({
        "messages": messages,
        "stream": stream,
    });
    if let Some(model) = &req.model {
        body["model"] = json!(model);
    }
    if !req.tools.is_empty() {
        body["tools"] = Value::Array(req.tools.iter().map(tool_to_openai).collect());
    }
    if let Some(t) = req.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(max) = req.max_tokens {
        body["max_tokens"] = json!(max);
    }
    if req.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    if stream {
        body["stream_options"] = json!({"include_usage": true});
    }
    body
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({"role": "system", "content": msg.content.extract_all_text()}),
        Role::User => user_to_openai(&msg.content),
        Role::Assistant => assistant_to_openai(&msg.content),
        Role::Tool => tool_result_to_openai(&msg.content),
    }
}

fn user_to_openai(content: &MessageContent) -> Value {
    let parts = match content {
        MessageContent::Text(t) => return json!({"role": "user", "content": t}),
        MessageContent::Parts(parts) => parts,
    };
    let has_images = parts.iter().any(|p| matches!(p, ContentPart::Image { .. }));
    if !has_images {
        return json!({"role": "user", "content": content.extract_all_text()});
    }
    let items: Vec<Value> = parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text { text } => Some(json!({"type": "text", "text": text})),
            ContentPart::Image { url, .. } => {
                Some(json!({"type": "image_url", "image_url": {"url": url}}))
            }
            _ => None,
        })
        .collect();
    json!({"role": "user", "content": items})
}

fn assistant_to_openai(content: &MessageContent) -> Value {
    let text = content.extract_all_text();
    let mut obj = json!({
        "role": "assistant",
        "content": if text.is_empty() { Value::Null } else { Value::String(text) },
    });
    let calls: Vec<Value> = content
        .tool_uses()
        .into_iter()
        .map(|tc| {
            json!({
                "id": tc.call_id,
                "type": "function",
                "function": {"name": tc.tool_name, "arguments": tc.arguments.to_string()},
            })
        })
        .collect();
    if !calls.is_empty() {
        obj["tool_calls"] = Value::Array(calls);
    }
    obj
}

fn tool_result_to_openai(content: &MessageContent) -> Value {
    let (id, text) = match content {
        MessageContent::Parts(parts) => parts
            .iter()
            .find_map(|p| match p {
                ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some((tool_use_id.as_str(), content.as_str())),
                _ => None,
            })
            .unwrap_or(("", "")),
        MessageContent::Text(t) => ("", t.as_str()),
    };
    json!({"role": "tool", "tool_call_id": id, "content": text})
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn provider_err(message: &str) -> Error {
    Error::Provider {
        provider: "openai_compat".into(),
        message: message.into(),
    }
}

pub(crate) fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .pointer("/choices/0")
        .ok_or_else(|| provider_err("no choices in response"))?;
    let message = choice
        .get("message")
        .ok_or_else(|| provider_err("no message in choice"))?;

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    Some(ToolCall {
                        call_id: tc.get("id")?.as_str()?.to_string(),
                        tool_name: tc.pointer("/function/name")?.as_str()?.to_string(),
                        arguments: parse_arguments(
                            tc.pointer("/function/arguments")
                                .and_then(Value::as_str)
                                .unwrap_or(""),
                        ),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        content: message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        tool_calls,
        usage: body.get("usage").and_then(parse_usage),
        model: body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

pub(crate) fn parse_usage(v: &Value) -> Option<Usage> {
    let prompt = v.get("prompt_tokens")?.as_u64()? as u32;
    let completion = v.get("completion_tokens")?.as_u64()? as u32;
    let total = v
        .get("total_tokens")
        .and_then(Value::as_u64)
        .map(|t| t as u32)
        .unwrap_or(prompt + completion);
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: total,
        reasoning_tokens: v
            .pointer("/completion_tokens_details/reasoning_tokens")
            .and_then(Value::as_u64)
            .map(|n| n as u32),
        cached_input_tokens: v
            .pointer("/prompt_tokens_details/cached_tokens")
            .and_then(Value::as_u64)
            .map(|n| n as u32),
    })
}

/// Tool arguments arrive as a JSON string. Empty means no arguments.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "tool arguments are not valid JSON");
        json!({})
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Stateful chunk parser. Tool-call fragments are keyed by their `index`
/// and released as `ToolCallFinished` once the choice reports a finish
/// reason. Usage may arrive after the finish reason, so `Done` waits for
/// `[DONE]` (or the end of the body).
#[derive(Debug, Default)]
pub(crate) struct StreamParser {
    calls: BTreeMap<u64, PendingCall>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl StreamParser {
    fn flush_calls(&mut self) -> Vec<Result<StreamEvent>> {
        std::mem::take(&mut self.calls)
            .into_values()
            .map(|c| {
                Ok(StreamEvent::ToolCallFinished {
                    arguments: parse_arguments(&c.arguments),
                    call_id: c.id,
                    tool_name: c.name,
                })
            })
            .collect()
    }

    fn finish(&mut self) -> Vec<Result<StreamEvent>> {
        let mut events = self.flush_calls();
        events.push(Ok(StreamEvent::Done {
            usage: self.usage.take(),
            finish_reason: Some(self.finish_reason.take().unwrap_or_else(|| "stop".into())),
        }));
        events
    }

    fn on_tool_delta(&mut self, tc: &Value, events: &mut Vec<Result<StreamEvent>>) {
        let index = tc.get("index").and_then(Value::as_u64).unwrap_or(0);
        let call = self.calls.entry(index).or_default();

        if let Some(id) = tc.get("id").and_then(Value::as_str) {
            if call.id.is_empty() {
                call.id = id.to_string();
                call.name = tc
                    .pointer("/function/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                events.push(Ok(StreamEvent::ToolCallStarted {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                }));
            }
        }

        if let Some(args) = tc.pointer("/function/arguments").and_then(Value::as_str) {
            if !args.is_empty() {
                call.arguments.push_str(args);
                events.push(Ok(StreamEvent::ToolCallDelta {
                    call_id: call.id.clone(),
                    delta: args.to_string(),
                }));
            }
        }
    }
}

impl SseParser for StreamParser {
    fn on_data(&mut self, data: &str) -> Vec<Result<StreamEvent>> {
        if data.trim() == "[DONE]" {
            return self.finish();
        }

        let v: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => return vec![Err(Error::Json(e))],
        };

        if let Some(msg) = v.pointer("/error/message").and_then(Value::as_str) {
            return vec![Err(provider_err(msg))];
        }
        if let Some(usage) = v.get("usage").and_then(parse_usage) {
            self.usage = Some(usage);
        }

        let mut events = Vec::new();
        let Some(choice) = v.pointer("/choices/0") else {
            return events;
        };

        if let Some(delta) = choice.get("delta") {
            let reasoning = delta
                .get("reasoning_content")
                .or_else(|| delta.get("reasoning"))
                .and_then(Value::as_str);
            if let Some(text) = reasoning.filter(|t| !t.is_empty()) {
                events.push(Ok(StreamEvent::Thinking {
                    text: text.to_string(),
                }));
            }
            if let Some(text) = delta
                .get("content")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
            {
                events.push(Ok(StreamEvent::Token {
                    text: text.to_string(),
                }));
            }
            if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                for tc in calls {
                    self.on_tool_delta(tc, &mut events);
                }
            }
        }

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            self.finish_reason = Some(reason.to_string());
            events.extend(self.flush_calls());
        }

        events
    }

    fn on_end(&mut self) -> Vec<Result<StreamEvent>> {
        self.finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        tracing::debug!(provider = %self.id, model = ?req.model, "chat request");
        let resp = self.send(&build_chat_body(req, false)).await?;
        let text = resp.text().await.map_err(from_reqwest)?;
        parse_chat_response(&serde_json::from_str(&text)?)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        tracing::debug!(provider = %self.id, model = ?req.model, "stream request");
        let resp = self.send(&build_chat_body(req, true)).await?;
        Ok(sse_response_stream(resp, StreamParser::default()))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
