//! Client-facing conversation messages.
//!
//! These are the messages the browser sends and the store persists. They
//! carry typed parts (text, files, reasoning, tool invocations) and are
//! converted into model-facing [`Message`]s right before a model call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tool::{ContentPart, Message, Role};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation metadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Guest,
    Regular,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Guest => "guest",
            UserType::Regular => "regular",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UI messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: UiRole,
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    InputAvailable,
    OutputAvailable,
    OutputError,
}

/// One invocation of a tool, as recorded on an assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPart {
    pub tool_name: String,
    pub tool_call_id: String,
    pub state: ToolState,
    pub input: Value,
    pub output: Option<Value>,
    pub error_text: Option<String>,
}

/// A typed message part. On the wire every part carries a `type` tag;
/// tool invocations are tagged `tool-<toolName>` and custom data parts
/// `data-<name>`, so the mapping goes through [`RawPart`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPart", into = "RawPart")]
pub enum MessagePart {
    Text {
        text: String,
    },
    File {
        media_type: String,
        name: Option<String>,
        url: String,
    },
    Reasoning {
        text: String,
    },
    StepStart,
    Tool(ToolPart),
    Data {
        name: String,
        data: Value,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<ToolState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl TryFrom<RawPart> for MessagePart {
    type Error = String;

    fn try_from(raw: RawPart) -> Result<Self, Self::Error> {
        let missing = |field: &str| format!("part `{}` is missing `{field}`", raw.kind);
        match raw.kind.as_str() {
            "text" => Ok(MessagePart::Text {
                text: raw.text.clone().ok_or_else(|| missing("text"))?,
            }),
            "reasoning" => Ok(MessagePart::Reasoning {
                text: raw.text.clone().unwrap_or_default(),
            }),
            "step-start" => Ok(MessagePart::StepStart),
            "file" => Ok(MessagePart::File {
                media_type: raw.media_type.clone().ok_or_else(|| missing("mediaType"))?,
                name: raw.name.clone(),
                url: raw.url.clone().ok_or_else(|| missing("url"))?,
            }),
            kind => {
                if let Some(tool_name) = kind.strip_prefix("tool-") {
                    Ok(MessagePart::Tool(ToolPart {
                        tool_name: tool_name.to_string(),
                        tool_call_id: raw.tool_call_id.clone().ok_or_else(|| missing("toolCallId"))?,
                        state: raw.state.unwrap_or(ToolState::InputAvailable),
                        input: raw.input.unwrap_or(Value::Null),
                        output: raw.output,
                        error_text: raw.error_text,
                    }))
                } else if let Some(name) = kind.strip_prefix("data-") {
                    Ok(MessagePart::Data {
                        name: name.to_string(),
                        data: raw.data.unwrap_or(Value::Null),
                    })
                } else {
                    Err(format!("unsupported part type `{kind}`"))
                }
            }
        }
    }
}

impl From<MessagePart> for RawPart {
    fn from(part: MessagePart) -> Self {
        match part {
            MessagePart::Text { text } => RawPart {
                kind: "text".into(),
                text: Some(text),
                ..Default::default()
            },
            MessagePart::Reasoning { text } => RawPart {
                kind: "reasoning".into(),
                text: Some(text),
                ..Default::default()
            },
            MessagePart::StepStart => RawPart {
                kind: "step-start".into(),
                ..Default::default()
            },
            MessagePart::File {
                media_type,
                name,
                url,
            } => RawPart {
                kind: "file".into(),
                media_type: Some(media_type),
                name,
                url: Some(url),
                ..Default::default()
            },
            MessagePart::Tool(tool) => RawPart {
                kind: format!("tool-{}", tool.tool_name),
                tool_call_id: Some(tool.tool_call_id),
                state: Some(tool.state),
                input: Some(tool.input),
                output: tool.output,
                error_text: tool.error_text,
                ..Default::default()
            },
            MessagePart::Data { name, data } => RawPart {
                kind: format!("data-{name}"),
                data: Some(data),
                ..Default::default()
            },
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversion to model messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert stored UI messages into the model-facing history.
///
/// Assistant messages are split at step boundaries: each step becomes an
/// assistant message (text + tool uses) followed by one tool message per
/// settled tool call. Calls still waiting for output are dropped, as are
/// reasoning and data parts.
pub fn to_model_messages(messages: &[ChatMessage]) -> Vec<Message> {
    let mut out = Vec::new();
    for msg in messages {
        match msg.role {
            UiRole::System => out.push(Message::system(msg.text())),
            UiRole::User => out.push(user_to_model(msg)),
            UiRole::Assistant => assistant_to_model(msg, &mut out),
        }
    }
    out
}

fn user_to_model(msg: &ChatMessage) -> Message {
    let parts: Vec<ContentPart> = msg
        .parts
        .iter()
        .filter_map(|p| match p {
            MessagePart::Text { text } => Some(ContentPart::Text { text: text.clone() }),
            MessagePart::File {
                media_type, url, ..
            } if media_type.starts_with("image/") => Some(ContentPart::Image {
                url: url.clone(),
                media_type: Some(media_type.clone()),
            }),
            _ => None,
        })
        .collect();

    match parts.as_slice() {
        [ContentPart::Text { text }] => Message::user(text.clone()),
        _ => Message::with_parts(Role::User, parts),
    }
}

#[derive(Default)]
struct StepBlock {
    content: Vec<ContentPart>,
    results: Vec<Message>,
}

impl StepBlock {
    fn flush_into(&mut self, out: &mut Vec<Message>) {
        if !self.content.is_empty() {
            out.push(Message::with_parts(
                Role::Assistant,
                std::mem::take(&mut self.content),
            ));
        }
        out.append(&mut self.results);
    }
}

fn assistant_to_model(msg: &ChatMessage, out: &mut Vec<Message>) {
    let mut block = StepBlock::default();
    for part in &msg.parts {
        match part {
            MessagePart::StepStart => block.flush_into(out),
            MessagePart::Text { text } if !text.is_empty() => {
                block.content.push(ContentPart::Text { text: text.clone() });
            }
            MessagePart::Tool(tool) => {
                let result = match tool.state {
                    ToolState::OutputAvailable => Message::tool_result(
                        tool.tool_call_id.clone(),
                        value_to_text(tool.output.as_ref().unwrap_or(&Value::Null)),
                    ),
                    ToolState::OutputError => Message::tool_error(
                        tool.tool_call_id.clone(),
                        tool.error_text.clone().unwrap_or_default(),
                    ),
                    ToolState::InputAvailable => continue,
                };
                block.content.push(ContentPart::ToolUse {
                    id: tool.tool_call_id.clone(),
                    name: tool.tool_name.clone(),
                    input: tool.input.clone(),
                });
                block.results.push(result);
            }
            _ => {}
        }
    }
    block.flush_into(out);
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
