//! Resumable response streams.
//!
//! Each chat response records its chunks in a [`LiveStream`]. A client that
//! reconnects replays the buffer and then follows the live broadcast until
//! the turn ends. Finished streams stay replayable for `retain_secs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::Stream;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

use rc_domain::trace::TraceEvent;

use super::ui_stream::UiChunk;

const BROADCAST_CAPACITY: usize = 256;

struct LiveInner {
    chunks: Vec<UiChunk>,
    /// Dropped on finish, which closes every subscriber.
    tx: Option<broadcast::Sender<UiChunk>>,
    finished_at: Option<Instant>,
}

pub struct LiveStream {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub owner: String,
    inner: Mutex<LiveInner>,
}

impl LiveStream {
    fn new(chat_id: Uuid, owner: &str) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            id: Uuid::new_v4(),
            chat_id,
            owner: owner.to_string(),
            inner: Mutex::new(LiveInner {
                chunks: Vec::new(),
                tx: Some(tx),
                finished_at: None,
            }),
        }
    }

    /// Record a chunk. Broadcasting under the lock keeps a subscriber's
    /// snapshot and live tail free of gaps and duplicates.
    pub fn push(&self, chunk: UiChunk) {
        let mut inner = self.inner.lock();
        if inner.finished_at.is_some() {
            return;
        }
        if let Some(tx) = &inner.tx {
            let _ = tx.send(chunk.clone());
        }
        inner.chunks.push(chunk);
    }

    pub fn finish(&self) {
        let mut inner = self.inner.lock();
        if inner.finished_at.is_none() {
            inner.finished_at = Some(Instant::now());
            inner.tx = None;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.lock().finished_at.is_some()
    }

    fn expired(&self, retain: Duration, now: Instant) -> bool {
        self.inner
            .lock()
            .finished_at
            .is_some_and(|at| now.duration_since(at) >= retain)
    }

    /// Everything recorded so far followed by live chunks until the stream
    /// finishes.
    pub fn replay(&self) -> impl Stream<Item = UiChunk> + Send + 'static {
        let (snapshot, rx) = {
            let inner = self.inner.lock();
            (
                inner.chunks.clone(),
                inner.tx.as_ref().map(|tx| tx.subscribe()),
            )
        };

        TraceEvent::StreamResumed {
            chat_id: self.chat_id.to_string(),
            stream_id: self.id.to_string(),
            replayed: snapshot.len(),
        }
        .emit();

        async_stream::stream! {
            for chunk in snapshot {
                yield chunk;
            }
            if let Some(mut rx) = rx {
                loop {
                    match rx.recv().await {
                        Ok(chunk) => yield chunk,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "resumed stream lagged, chunks dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stream ids recorded against chats.
pub struct StreamRegistry {
    retain: Duration,
    by_chat: RwLock<HashMap<Uuid, Vec<Arc<LiveStream>>>>,
}

impl StreamRegistry {
    pub fn new(retain: Duration) -> Self {
        Self {
            retain,
            by_chat: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self, chat_id: Uuid, owner: &str) -> Arc<LiveStream> {
        let stream = Arc::new(LiveStream::new(chat_id, owner));
        self.by_chat
            .write()
            .entry(chat_id)
            .or_default()
            .push(stream.clone());
        tracing::debug!(%chat_id, stream_id = %stream.id, "stream created");
        stream
    }

    /// The most recent stream of a chat.
    pub fn latest(&self, chat_id: Uuid) -> Option<Arc<LiveStream>> {
        self.by_chat
            .read()
            .get(&chat_id)
            .and_then(|streams| streams.last().cloned())
    }

    pub fn stream_ids(&self, chat_id: Uuid) -> Vec<Uuid> {
        self.by_chat
            .read()
            .get(&chat_id)
            .map(|streams| streams.iter().map(|s| s.id).collect())
            .unwrap_or_default()
    }

    pub fn remove_chat(&self, chat_id: Uuid) {
        self.by_chat.write().remove(&chat_id);
    }

    pub fn remove_owner(&self, owner: &str) {
        self.by_chat.write().retain(|_, streams| {
            streams.retain(|s| s.owner != owner);
            !streams.is_empty()
        });
    }

    /// Drop finished streams older than the retention window. Returns how
    /// many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.by_chat.write().retain(|_, streams| {
            let before = streams.len();
            streams.retain(|s| !s.expired(self.retain, now));
            removed += before - streams.len();
            !streams.is_empty()
        });
        if removed > 0 {
            tracing::debug!(removed, "evicted finished streams");
        }
        removed
    }
}
