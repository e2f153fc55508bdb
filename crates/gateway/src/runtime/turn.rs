//! Chat turn execution: streams model output as UI stream parts, runs tool
//! calls between steps and persists the assistant message at the end.
//!
//! Entry point: [`start_chat_turn`] opens the first model stream, spawns the
//! step loop and returns the channel of [`UiChunk`]s for the response body.

use std::collections::HashMap;
use std::time::Instant;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use rc_domain::message::{to_model_messages, ChatMessage, MessagePart, ToolPart, ToolState, UiRole};
use rc_domain::stream::{BoxStream, StreamEvent, Usage};
use rc_domain::tool::{ContentPart, Message, Role, ToolCall, ToolDefinition};
use rc_domain::trace::TraceEvent;
use rc_domain::usage::AppUsage;
use rc_providers::{ChatRequest, ResolvedModel};
use rc_store::DbMessage;

use super::ui_stream::{UiChunk, UiStreamPart, UiStreamWriter};
use crate::session::Session;
use crate::state::AppState;
use crate::tools::ToolContext;

/// Model calls per turn; the last step's tool results end the turn.
pub const MAX_STEPS: usize = 5;

/// Shown to the client when a turn fails after the response started.
pub const STREAM_ERROR_TEXT: &str = "Oops, an error occurred!";

type EventStream = BoxStream<'static, rc_domain::Result<StreamEvent>>;

pub struct ChatTurnInput {
    pub chat_id: Uuid,
    pub session: Session,
    pub model: ResolvedModel,
    /// Full chat history, ending with the new user message.
    pub history: Vec<ChatMessage>,
    pub system: String,
    pub active_tools: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Start a turn. The first model call happens before this returns, so
/// provider failures surface as an error response instead of a broken
/// stream.
pub async fn start_chat_turn(
    state: &AppState,
    input: ChatTurnInput,
) -> rc_domain::Result<mpsc::Receiver<UiChunk>> {
    let mut messages = vec![Message::system(input.system.as_str())];
    messages.extend(to_model_messages(&input.history));
    let tool_defs = state.tools.definitions(&input.active_tools);

    let started = Instant::now();
    let req = build_request(&input.model, &messages, &tool_defs);
    let first = input.model.provider.chat_stream(&req).await?;

    let (tx, rx) = mpsc::channel::<UiChunk>(64);
    let recorder = state
        .config
        .streams
        .resumable
        .then(|| state.streams.create(input.chat_id, &input.session.user_id));
    let writer = UiStreamWriter::new(tx, recorder);

    let span = tracing::info_span!(
        "chat.turn",
        chat_id = %input.chat_id,
        model = %input.model.id,
        "otel.kind" = "SERVER",
    );
    let state = state.clone();
    tokio::spawn(
        async move {
            tracing::debug!("turn started");
            // Marks the replay buffer complete even if the turn panics.
            let _finish = FinishOnDrop(writer.clone());
            let turn = Turn {
                state: &state,
                input: &input,
                writer: &writer,
            };
            let mut progress = Progress::new();
            match turn
                .run(&mut progress, messages, tool_defs, (first, started))
                .await
            {
                Ok(()) => {
                    if let Err(e) = turn.finish(progress).await {
                        tracing::error!(error = %e, "failed to persist assistant message");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "chat turn failed");
                    writer
                        .write(UiStreamPart::Error {
                            error_text: STREAM_ERROR_TEXT.into(),
                        })
                        .await;
                    if progress.has_content() {
                        if let Err(e) = turn.persist(progress).await {
                            tracing::error!(error = %e, "failed to persist partial assistant message");
                        }
                    }
                }
            }
        }
        .instrument(span),
    );

    Ok(rx)
}

fn build_request(
    model: &ResolvedModel,
    messages: &[Message],
    tool_defs: &[ToolDefinition],
) -> ChatRequest {
    let mut req = ChatRequest::new(&model.model, messages.to_vec());
    req.tools = tool_defs.to_vec();
    req
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Calls `finish` on the writer when dropped.
struct FinishOnDrop(UiStreamWriter);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// The assistant message as built so far. Lives outside the step loop so a
/// failed turn still saves what the client already saw.
struct Progress {
    message_id: Uuid,
    parts: Vec<MessagePart>,
    total: Usage,
}

impl Progress {
    fn new() -> Self {
        Self {
            message_id: Uuid::new_v4(),
            parts: Vec::new(),
            total: Usage::default(),
        }
    }

    fn has_content(&self) -> bool {
        self.parts
            .iter()
            .any(|p| !matches!(p, MessagePart::StepStart))
    }

    fn record_text(&mut self, output: &StepOutput) {
        if !output.reasoning.is_empty() {
            self.parts.push(MessagePart::Reasoning {
                text: output.reasoning.clone(),
            });
        }
        if !output.text.is_empty() {
            self.parts.push(MessagePart::Text {
                text: output.text.clone(),
            });
        }
    }
}

/// What one model call produced.
#[derive(Default)]
struct StepOutput {
    text: String,
    reasoning: String,
    tool_calls: Vec<ToolCall>,
    usage: Option<Usage>,
}

struct Turn<'a> {
    state: &'a AppState,
    input: &'a ChatTurnInput,
    writer: &'a UiStreamWriter,
}

impl Turn<'_> {
    async fn run(
        &self,
        progress: &mut Progress,
        mut messages: Vec<Message>,
        tool_defs: Vec<ToolDefinition>,
        first: (EventStream, Instant),
    ) -> anyhow::Result<()> {
        let model = &self.input.model;
        self.writer
            .write(UiStreamPart::Start {
                message_id: progress.message_id.to_string(),
            })
            .await;

        let mut pending = Some(first);

        for step in 0..MAX_STEPS {
            let (mut events, started) = match pending.take() {
                Some(opened) => opened,
                None => {
                    let started = Instant::now();
                    let req = build_request(model, &messages, &tool_defs);
                    (model.provider.chat_stream(&req).await?, started)
                }
            };

            self.writer.write(UiStreamPart::StartStep).await;
            progress.parts.push(MessagePart::StepStart);

            let mut output = StepOutput::default();
            let consumed = self.consume_step(&mut events, &mut output).await;
            // Text streamed before a failure is kept.
            progress.record_text(&output);
            consumed?;

            TraceEvent::LlmRequest {
                provider: model.provider.provider_id().to_string(),
                model: model.model.clone(),
                step,
                streaming: true,
                duration_ms: started.elapsed().as_millis() as u64,
                prompt_tokens: output.usage.as_ref().map(|u| u.prompt_tokens),
                completion_tokens: output.usage.as_ref().map(|u| u.completion_tokens),
            }
            .emit();

            if let Some(usage) = &output.usage {
                progress.total.accumulate(usage);
            }

            if output.tool_calls.is_empty() {
                self.writer.write(UiStreamPart::FinishStep).await;
                break;
            }

            messages.push(assistant_tool_message(&output));
            for (call, outcome) in self.run_tools(&output.tool_calls).await {
                let (tool_part, tool_message) = match outcome {
                    Ok(value) => (
                        ToolPart {
                            tool_name: call.tool_name.clone(),
                            tool_call_id: call.call_id.clone(),
                            state: ToolState::OutputAvailable,
                            input: call.arguments.clone(),
                            output: Some(value.clone()),
                            error_text: None,
                        },
                        Message::tool_result(&call.call_id, value.to_string()),
                    ),
                    Err(error_text) => (
                        ToolPart {
                            tool_name: call.tool_name.clone(),
                            tool_call_id: call.call_id.clone(),
                            state: ToolState::OutputError,
                            input: call.arguments.clone(),
                            output: None,
                            error_text: Some(error_text.clone()),
                        },
                        Message::tool_error(&call.call_id, error_text),
                    ),
                };
                progress.parts.push(MessagePart::Tool(tool_part));
                messages.push(tool_message);
            }

            self.writer.write(UiStreamPart::FinishStep).await;
            if step + 1 == MAX_STEPS {
                tracing::debug!(steps = MAX_STEPS, "step limit reached");
            }
        }

        Ok(())
    }

    /// Forward one model stream to the client and collect its output.
    async fn consume_step(
        &self,
        events: &mut EventStream,
        out: &mut StepOutput,
    ) -> anyhow::Result<()> {
        let show_reasoning = self.input.model.reasoning;
        let text_id = Uuid::new_v4().to_string();
        let reasoning_id = Uuid::new_v4().to_string();
        let mut text_open = false;
        let mut reasoning_open = false;

        // call_id -> (tool name, argument JSON so far)
        let mut partial: HashMap<String, (String, String)> = HashMap::new();

        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Thinking { text } => {
                    if !show_reasoning {
                        continue;
                    }
                    if !reasoning_open {
                        reasoning_open = true;
                        self.writer
                            .write(UiStreamPart::ReasoningStart {
                                id: reasoning_id.clone(),
                            })
                            .await;
                    }
                    out.reasoning.push_str(&text);
                    self.writer
                        .write(UiStreamPart::ReasoningDelta {
                            id: reasoning_id.clone(),
                            delta: text,
                        })
                        .await;
                }
                StreamEvent::Token { text } => {
                    if reasoning_open {
                        reasoning_open = false;
                        self.writer
                            .write(UiStreamPart::ReasoningEnd {
                                id: reasoning_id.clone(),
                            })
                            .await;
                    }
                    if !text_open {
                        text_open = true;
                        self.writer
                            .write(UiStreamPart::TextStart {
                                id: text_id.clone(),
                            })
                            .await;
                    }
                    out.text.push_str(&text);
                    self.writer
                        .write(UiStreamPart::TextDelta {
                            id: text_id.clone(),
                            delta: text,
                        })
                        .await;
                }
                StreamEvent::ToolCallStarted { call_id, tool_name } => {
                    self.writer
                        .write(UiStreamPart::ToolInputStart {
                            tool_call_id: call_id.clone(),
                            tool_name: tool_name.clone(),
                        })
                        .await;
                    partial.insert(call_id, (tool_name, String::new()));
                }
                StreamEvent::ToolCallDelta { call_id, delta } => {
                    if let Some((_, args)) = partial.get_mut(&call_id) {
                        args.push_str(&delta);
                    }
                }
                StreamEvent::ToolCallFinished {
                    call_id,
                    tool_name,
                    arguments,
                } => {
                    partial.remove(&call_id);
                    self.announce_tool_input(out, call_id, tool_name, arguments)
                        .await;
                }
                StreamEvent::Done { usage, .. } => {
                    out.usage = usage;
                    break;
                }
                StreamEvent::Error { message } => anyhow::bail!(message),
            }
        }

        // Providers that only send start + deltas.
        for (call_id, (tool_name, raw)) in partial.drain() {
            let arguments = if raw.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&raw).unwrap_or_else(|e| {
                    tracing::warn!(
                        %call_id,
                        tool = %tool_name,
                        error = %e,
                        "tool call arguments are not valid JSON; defaulting to empty object"
                    );
                    Value::Object(Default::default())
                })
            };
            self.announce_tool_input(out, call_id, tool_name, arguments)
                .await;
        }

        if reasoning_open {
            self.writer
                .write(UiStreamPart::ReasoningEnd { id: reasoning_id })
                .await;
        }
        if text_open {
            self.writer.write(UiStreamPart::TextEnd { id: text_id }).await;
        }
        Ok(())
    }

    async fn announce_tool_input(
        &self,
        out: &mut StepOutput,
        call_id: String,
        tool_name: String,
        arguments: Value,
    ) {
        self.writer
            .write(UiStreamPart::ToolInputAvailable {
                tool_call_id: call_id.clone(),
                tool_name: tool_name.clone(),
                input: arguments.clone(),
            })
            .await;
        out.tool_calls.push(ToolCall {
            call_id,
            tool_name,
            arguments,
        });
    }

    /// Run a step's tool calls concurrently and report each outcome.
    async fn run_tools<'c>(
        &self,
        calls: &'c [ToolCall],
    ) -> Vec<(&'c ToolCall, Result<Value, String>)> {
        let ctx = ToolContext {
            session: self.input.session.clone(),
            chat_id: self.input.chat_id,
            writer: self.writer.clone(),
        };
        let active = &self.input.active_tools;

        let outcomes = futures_util::future::join_all(calls.iter().map(|call| {
            let ctx = &ctx;
            let span = tracing::info_span!("tool.call", tool = %call.tool_name, call_id = %call.call_id);
            async move { self.state.tools.invoke(ctx, active, call).await }.instrument(span)
        }))
        .await;

        for (call, outcome) in calls.iter().zip(&outcomes) {
            match outcome {
                Ok(output) => {
                    self.writer
                        .write(UiStreamPart::ToolOutputAvailable {
                            tool_call_id: call.call_id.clone(),
                            output: output.clone(),
                        })
                        .await
                }
                Err(error_text) => {
                    self.writer
                        .write(UiStreamPart::ToolOutputError {
                            tool_call_id: call.call_id.clone(),
                            error_text: error_text.clone(),
                        })
                        .await
                }
            }
        }
        calls.iter().zip(outcomes).collect()
    }

    /// Report usage, close the stream and persist the assistant message.
    async fn finish(&self, mut progress: Progress) -> anyhow::Result<()> {
        let usage = self
            .state
            .pricing
            .enrich(&self.input.model.model, &progress.total)
            .await;
        let usage_json = serde_json::to_value(&usage)?;

        self.writer.data("usage", usage_json.clone()).await;
        progress.parts.push(MessagePart::Data {
            name: "usage".into(),
            data: usage_json,
        });
        self.writer.write(UiStreamPart::Finish).await;

        self.save(progress.message_id, progress.parts, usage)
    }

    /// Persist what a failed turn produced, with the usage gathered so far.
    async fn persist(&self, mut progress: Progress) -> anyhow::Result<()> {
        let usage = self
            .state
            .pricing
            .enrich(&self.input.model.model, &progress.total)
            .await;
        progress.parts.push(MessagePart::Data {
            name: "usage".into(),
            data: serde_json::to_value(&usage)?,
        });
        self.save(progress.message_id, progress.parts, usage)
    }

    fn save(
        &self,
        message_id: Uuid,
        parts: Vec<MessagePart>,
        usage: AppUsage,
    ) -> anyhow::Result<()> {
        let chat_id = self.input.chat_id;
        let message = ChatMessage {
            id: message_id,
            role: UiRole::Assistant,
            parts,
        };
        self.state
            .store
            .messages
            .save_messages(&[DbMessage::from_ui(chat_id, &message)])?;

        TraceEvent::UsageEnriched {
            chat_id: chat_id.to_string(),
            model_id: self.input.model.id.clone(),
            priced: usage.cost_usd.is_some(),
            total_usd: usage.cost_usd.map(|c| c.total_usd),
        }
        .emit();

        if let Err(e) = self
            .state
            .store
            .chats
            .update_chat_last_context_by_id(chat_id, usage)
        {
            tracing::warn!(%chat_id, error = %e, "failed to record last context");
        }
        Ok(())
    }
}

/// The assistant message that carries a step's text and tool calls back to
/// the model on the next step.
fn assistant_tool_message(output: &StepOutput) -> Message {
    let mut content = Vec::with_capacity(output.tool_calls.len() + 1);
    if !output.text.is_empty() {
        content.push(ContentPart::Text {
            text: output.text.clone(),
        });
    }
    content.extend(output.tool_calls.iter().map(|call| ContentPart::ToolUse {
        id: call.call_id.clone(),
        name: call.tool_name.clone(),
        input: call.arguments.clone(),
    }));
    Message::with_parts(Role::Assistant, content)
}
