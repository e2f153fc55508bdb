//! File-backed persistence for chats, messages, documents and suggestions.
//!
//! Layout under the configured store path:
//!
//! ```text
//! chats.json              all chats, keyed by id
//! messages/<chatId>.jsonl append-only message log per chat
//! documents.json          every document version
//! suggestions.json        edit suggestions per document version
//! ```
//!
//! Every mutation writes through to disk before it returns.

pub mod chats;
pub mod documents;
mod json_file;
pub mod messages;

use std::path::Path;

use chrono::{Duration, Utc};
use rc_domain::error::Result;
use rc_domain::message::UiRole;
use uuid::Uuid;

pub use chats::{Chat, ChatPage, ChatStore};
pub use documents::{Document, DocumentKind, DocumentStore, Suggestion};
pub use messages::{DbMessage, MessageLog};

/// All persistence behind one handle.
pub struct Store {
    pub chats: ChatStore,
    pub messages: MessageLog,
    pub documents: DocumentStore,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let store = Self {
            chats: ChatStore::open(path)?,
            messages: MessageLog::open(path)?,
            documents: DocumentStore::open(path)?,
        };
        tracing::info!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Delete a chat together with its messages. Returns the deleted chat.
    pub fn delete_chat_by_id(&self, id: Uuid) -> Result<Option<Chat>> {
        let deleted = self.chats.delete(id)?;
        if deleted.is_some() {
            self.messages.remove_chat(id)?;
        }
        Ok(deleted)
    }

    /// Delete every chat a user owns. Returns how many were removed.
    pub fn delete_all_chats_by_user_id(&self, user_id: &str) -> Result<usize> {
        let removed = self.chats.delete_by_user(user_id)?;
        for chat in &removed {
            self.messages.remove_chat(chat.id)?;
        }
        Ok(removed.len())
    }

    /// User-role messages the user sent across their chats in the last
    /// `difference_in_hours` hours.
    pub fn get_message_count_by_user_id(&self, user_id: &str, difference_in_hours: i64) -> Result<usize> {
        let since = Utc::now() - Duration::hours(difference_in_hours);
        let mut count = 0;
        for chat_id in self.chats.ids_for_user(user_id) {
            count += self
                .messages
                .count_where(chat_id, |m| m.role == UiRole::User && m.created_at >= since)?;
        }
        Ok(count)
    }
}
