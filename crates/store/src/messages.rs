//! Append-only message logs, one `<chatId>.jsonl` per chat.
//!
//! Reads are served from a bounded write-through cache after the first
//! load. Cache misses and appends both run under the cache's write lock, so
//! a load never races an append to the same log.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rc_domain::error::Result;
use rc_domain::message::{ChatMessage, MessagePart, UiRole};
use rc_domain::trace::TraceEvent;

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: UiRole,
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl DbMessage {
    pub fn from_ui(chat_id: Uuid, msg: &ChatMessage) -> Self {
        Self {
            id: msg.id,
            chat_id,
            role: msg.role,
            parts: msg.parts.clone(),
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn to_ui(&self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            role: self.role,
            parts: self.parts.clone(),
        }
    }
}

/// Chats whose messages stay cached.
const CACHED_CHATS: usize = 256;

pub struct MessageLog {
    dir: PathBuf,
    cache: RwLock<HashMap<Uuid, Vec<DbMessage>>>,
    capacity: usize,
}

impl MessageLog {
    pub fn open(base: &Path) -> Result<Self> {
        let dir = base.join("messages");
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            cache: RwLock::new(HashMap::new()),
            capacity: CACHED_CHATS,
        })
    }

    fn path(&self, chat_id: Uuid) -> PathBuf {
        self.dir.join(format!("{chat_id}.jsonl"))
    }

    /// Append messages to their chats' logs. Disk first; a cached log only
    /// sees lines that were written, an uncached one is loaded on next read.
    pub fn save_messages(&self, messages: &[DbMessage]) -> Result<()> {
        let mut by_chat: Vec<(Uuid, Vec<&DbMessage>)> = Vec::new();
        for m in messages {
            match by_chat.iter_mut().find(|(id, _)| *id == m.chat_id) {
                Some((_, group)) => group.push(m),
                None => by_chat.push((m.chat_id, vec![m])),
            }
        }

        for (chat_id, group) in by_chat {
            let mut buf = String::new();
            for m in &group {
                buf.push_str(&serde_json::to_string(m)?);
                buf.push('\n');
            }
            let mut cache = self.cache.write();
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path(chat_id))?;
            file.write_all(buf.as_bytes())?;
            if let Some(lines) = cache.get_mut(&chat_id) {
                lines.extend(group.iter().map(|m| (*m).clone()));
            }
            drop(cache);

            TraceEvent::MessagesSaved {
                chat_id: chat_id.to_string(),
                count: group.len(),
            }
            .emit();
        }
        Ok(())
    }

    /// Messages of a chat in the order they were saved.
    pub fn get_messages_by_chat_id(&self, chat_id: Uuid) -> Result<Vec<DbMessage>> {
        self.read(chat_id)
    }

    fn read(&self, chat_id: Uuid) -> Result<Vec<DbMessage>> {
        if let Some(lines) = self.cache.read().get(&chat_id) {
            return Ok(lines.clone());
        }
        let mut cache = self.cache.write();
        if let Some(lines) = cache.get(&chat_id) {
            return Ok(lines.clone());
        }
        let lines = read_jsonl(&self.path(chat_id), chat_id)?;
        if cache.len() >= self.capacity {
            // Any entry will do; evicted logs reload from disk.
            if let Some(evict) = cache.keys().next().copied() {
                cache.remove(&evict);
            }
        }
        cache.insert(chat_id, lines.clone());
        Ok(lines)
    }

    /// Count a chat's messages matching `pred` without copying them. Cold
    /// logs are read from disk and not cached.
    pub(crate) fn count_where(&self, chat_id: Uuid, pred: impl Fn(&DbMessage) -> bool) -> Result<usize> {
        let cache = self.cache.read();
        if let Some(lines) = cache.get(&chat_id) {
            return Ok(lines.iter().filter(|m| pred(m)).count());
        }
        let lines = read_jsonl(&self.path(chat_id), chat_id)?;
        Ok(lines.iter().filter(|m| pred(m)).count())
    }

    pub(crate) fn remove_chat(&self, chat_id: Uuid) -> Result<()> {
        let mut cache = self.cache.write();
        cache.remove(&chat_id);
        match std::fs::remove_file(self.path(chat_id)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

fn read_jsonl(path: &Path, chat_id: Uuid) -> Result<Vec<DbMessage>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    let mut out = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<DbMessage>(line) {
            Ok(m) => out.push(m),
            Err(e) => tracing::warn!(%chat_id, error = %e, "skipping malformed message line"),
        }
    }
    Ok(out)
}
