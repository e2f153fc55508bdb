//! The UI message stream: the chunk vocabulary the browser client renders,
//! the writer tools use to push custom data parts, and SSE framing.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{Stream, StreamExt};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::sync::mpsc;

use super::resumable::LiveStream;

/// Fixed stream parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiStreamPart {
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },
    StartStep,
    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },
    ReasoningStart { id: String },
    ReasoningDelta { id: String, delta: String },
    ReasoningEnd { id: String },
    #[serde(rename_all = "camelCase")]
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable { tool_call_id: String, output: Value },
    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    FinishStep,
    Finish,
    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
}

/// A custom `data-<name>` part. Transient parts reach the client but are
/// not kept on the message.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChunk {
    pub name: String,
    pub data: Value,
    pub transient: bool,
}

impl Serialize for DataChunk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &format!("data-{}", self.name))?;
        map.serialize_entry("data", &self.data)?;
        if self.transient {
            map.serialize_entry("transient", &true)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UiChunk {
    Part(UiStreamPart),
    Data(DataChunk),
}

impl From<UiStreamPart> for UiChunk {
    fn from(part: UiStreamPart) -> Self {
        UiChunk::Part(part)
    }
}

impl UiChunk {
    pub fn data(name: impl Into<String>, data: Value) -> Self {
        UiChunk::Data(DataChunk {
            name: name.into(),
            data,
            transient: false,
        })
    }

    pub fn transient(name: impl Into<String>, data: Value) -> Self {
        UiChunk::Data(DataChunk {
            name: name.into(),
            data,
            transient: true,
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Writer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Write side of one response stream. Chunks go to the HTTP response and,
/// for resumable streams, into the replay buffer. A client that went away
/// does not stop the writer: the turn still runs to completion.
#[derive(Clone)]
pub struct UiStreamWriter {
    tx: mpsc::Sender<UiChunk>,
    recorder: Option<Arc<LiveStream>>,
}

impl UiStreamWriter {
    pub fn new(tx: mpsc::Sender<UiChunk>, recorder: Option<Arc<LiveStream>>) -> Self {
        Self { tx, recorder }
    }

    pub async fn write(&self, chunk: impl Into<UiChunk>) {
        let chunk = chunk.into();
        if let Some(recorder) = &self.recorder {
            recorder.push(chunk.clone());
        }
        if !self.tx.is_closed() {
            let _ = self.tx.send(chunk).await;
        }
    }

    pub async fn data(&self, name: &str, data: Value) {
        self.write(UiChunk::data(name, data)).await;
    }

    pub async fn transient(&self, name: &str, data: Value) {
        self.write(UiChunk::transient(name, data)).await;
    }

    /// Mark the replay buffer complete. Called once, after the last chunk.
    pub fn finish(&self) {
        if let Some(recorder) = &self.recorder {
            recorder.finish();
        }
    }
}

impl From<UiChunk> for Event {
    fn from(chunk: UiChunk) -> Self {
        Event::default().data(chunk.to_json())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE framing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

/// Frame chunks as `data: <json>` events followed by `data: [DONE]`.
pub fn sse_response<S>(chunks: S) -> Response
where
    S: Stream<Item = UiChunk> + Send + 'static,
{
    let events = chunks
        .map(|chunk| Ok::<_, Infallible>(Event::from(chunk)))
        .chain(futures_util::stream::once(async {
            Ok::<_, Infallible>(Event::default().data("[DONE]"))
        }));

    (
        [(UI_STREAM_HEADER, "v1")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// Adapt a chunk receiver into a stream for [`sse_response`].
pub fn receiver_stream(mut rx: mpsc::Receiver<UiChunk>) -> impl Stream<Item = UiChunk> {
    async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield chunk;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fixed_parts_use_ai_sdk_names() {
        let start = UiChunk::from(UiStreamPart::Start {
            message_id: "m1".into(),
        });
        assert_eq!(
            serde_json::to_value(&start).unwrap(),
            json!({"type": "start", "messageId": "m1"})
        );

        let delta = UiChunk::from(UiStreamPart::TextDelta {
            id: "t".into(),
            delta: "Hi".into(),
        });
        assert_eq!(
            serde_json::to_value(&delta).unwrap(),
            json!({"type": "text-delta", "id": "t", "delta": "Hi"})
        );

        let out = UiChunk::from(UiStreamPart::ToolOutputError {
            tool_call_id: "c1".into(),
            error_text: "boom".into(),
        });
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({"type": "tool-output-error", "toolCallId": "c1", "errorText": "boom"})
        );

        assert_eq!(
            serde_json::to_value(UiChunk::from(UiStreamPart::FinishStep)).unwrap(),
            json!({"type": "finish-step"})
        );
    }

    #[test]
    fn data_parts_carry_name_and_transient_flag() {
        assert_eq!(
            serde_json::to_value(UiChunk::data("usage", json!({"totalTokens": 3}))).unwrap(),
            json!({"type": "data-usage", "data": {"totalTokens": 3}})
        );
        assert_eq!(
            serde_json::to_value(UiChunk::transient("textDelta", json!("ab"))).unwrap(),
            json!({"type": "data-textDelta", "data": "ab", "transient": true})
        );
    }

    #[tokio::test]
    async fn writer_survives_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let writer = UiStreamWriter::new(tx, None);
        writer.write(UiStreamPart::StartStep).await;
        writer.data("usage", json!({})).await;
    }

    #[tokio::test]
    async fn sse_body_ends_with_done() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(UiStreamPart::Finish.into()).await.unwrap();
        drop(tx);
        let resp = sse_response(receiver_stream(rx));
        assert_eq!(resp.headers().get(UI_STREAM_HEADER).unwrap(), "v1");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text, "data: {\"type\":\"finish\"}\n\ndata: [DONE]\n\n");
    }
}
