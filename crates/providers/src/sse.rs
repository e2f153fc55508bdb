//! Server-sent-event plumbing for streaming providers.
//!
//! A response body arrives in arbitrary chunks. [`SseBuffer`] accumulates
//! raw bytes, cuts complete events at blank lines and hands back their
//! `data:` payloads; [`sse_response_stream`] drives a provider-specific
//! [`SseParser`] over those payloads.

use crate::util::from_reqwest;
use rc_domain::error::Result;
use rc_domain::stream::{BoxStream, StreamEvent};

/// Provider-specific interpretation of `data:` payloads.
pub(crate) trait SseParser: Send + 'static {
    /// Events for one payload (may be empty).
    fn on_data(&mut self, data: &str) -> Vec<Result<StreamEvent>>;

    /// Called once when the body closes without the parser having emitted
    /// `Done`. Must end with a `Done` event.
    fn on_end(&mut self) -> Vec<Result<StreamEvent>>;
}

/// Byte buffer that yields complete SSE `data:` payloads.
///
/// Bytes are kept raw until an event is complete, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Default)]
pub(crate) struct SseBuffer {
    bytes: Vec<u8>,
}

impl SseBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Drain every complete event, returning its data payloads.
    /// Multiple `data:` lines in one event are joined with `\n`.
    pub(crate) fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Some((end, delim)) = find_event_end(&self.bytes) {
            let block: Vec<u8> = self.bytes.drain(..end + delim).collect();
            if let Some(data) = event_data(&block[..end]) {
                out.push(data);
            }
        }
        out
    }

    /// Treat whatever remains as a final event.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let block = std::mem::take(&mut self.bytes);
        event_data(&block)
    }
}

fn find_event_end(bytes: &[u8]) -> Option<(usize, usize)> {
    for i in 0..bytes.len() {
        if bytes[i..].starts_with(b"\n\n") {
            return Some((i, 2));
        }
        if bytes[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
    }
    None
}

fn event_data(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let lines: Vec<&str> = text
        .lines()
        .filter_map(|line| line.trim_end_matches('\r').strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();
    let data = lines.join("\n");
    if data.trim().is_empty() {
        None
    } else {
        Some(data)
    }
}

/// Stream provider events out of an SSE response.
///
/// Guarantees exactly one trailing `Done`: the parser's own, or the one
/// produced by [`SseParser::on_end`] when the body closes first.
pub(crate) fn sse_response_stream<P: SseParser>(
    response: reqwest::Response,
    mut parser: P,
) -> BoxStream<'static, Result<StreamEvent>> {
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = SseBuffer::default();
        let mut done = false;

        'read: loop {
            let payloads = match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push(&bytes);
                    buffer.drain()
                }
                Ok(None) => {
                    let tail: Vec<String> = buffer.finish().into_iter().collect();
                    for data in tail {
                        for event in parser.on_data(&data) {
                            done |= matches!(event, Ok(StreamEvent::Done { .. }));
                            yield event;
                        }
                    }
                    break 'read;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    return;
                }
            };

            for data in payloads {
                for event in parser.on_data(&data) {
                    done |= matches!(event, Ok(StreamEvent::Done { .. }));
                    yield event;
                }
                if done {
                    break 'read;
                }
            }
        }

        if !done {
            for event in parser.on_end() {
                yield event;
            }
        }
    };

    Box::pin(stream)
}
