use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_file;
use rc_domain::error::{Error, Result};
use rc_domain::message::Visibility;
use rc_domain::trace::TraceEvent;
use rc_domain::usage::AppUsage;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat entity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub user_id: String,
    #[serde(default)]
    pub visibility: Visibility,
    /// Enriched usage of the most recent response.
    #[serde(default)]
    pub last_context: Option<AppUsage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPage {
    pub chats: Vec<Chat>,
    pub has_more: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// All chats, held in memory and mirrored to `chats.json`.
pub struct ChatStore {
    path: PathBuf,
    chats: RwLock<HashMap<Uuid, Chat>>,
}

impl ChatStore {
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join("chats.json");
        let chats: HashMap<Uuid, Chat> = json_file::load(&path)?;
        tracing::info!(chats = chats.len(), path = %path.display(), "chat store loaded");
        Ok(Self {
            path,
            chats: RwLock::new(chats),
        })
    }

    /// Apply `f` to a copy under the write lock, persist the copy, then
    /// swap it in. Memory never holds a change the file lacks, and disk
    /// order matches memory order.
    fn mutate<R>(&self, f: impl FnOnce(&mut HashMap<Uuid, Chat>) -> R) -> Result<R> {
        let mut chats = self.chats.write();
        let mut next = chats.clone();
        let out = f(&mut next);
        json_file::save(&self.path, &next)?;
        *chats = next;
        Ok(out)
    }

    pub fn save_chat(&self, chat: Chat) -> Result<()> {
        let event = TraceEvent::ChatCreated {
            chat_id: chat.id.to_string(),
            user_id: chat.user_id.clone(),
            visibility: format!("{:?}", chat.visibility).to_lowercase(),
        };
        self.mutate(|chats| {
            chats.insert(chat.id, chat);
        })?;
        event.emit();
        Ok(())
    }

    pub fn get_chat_by_id(&self, id: Uuid) -> Option<Chat> {
        self.chats.read().get(&id).cloned()
    }

    pub(crate) fn delete(&self, id: Uuid) -> Result<Option<Chat>> {
        if !self.chats.read().contains_key(&id) {
            return Ok(None);
        }
        self.mutate(|chats| chats.remove(&id))
    }

    pub(crate) fn delete_by_user(&self, user_id: &str) -> Result<Vec<Chat>> {
        self.mutate(|chats| {
            let ids: Vec<Uuid> = chats
                .values()
                .filter(|c| c.user_id == user_id)
                .map(|c| c.id)
                .collect();
            ids.iter().filter_map(|id| chats.remove(id)).collect()
        })
    }

    pub(crate) fn ids_for_user(&self, user_id: &str) -> Vec<Uuid> {
        self.chats
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect()
    }

    /// A page of the user's chats, newest first.
    ///
    /// `starting_after` returns chats newer than the cursor chat,
    /// `ending_before` chats older than it. An unknown cursor id is an error.
    pub fn get_chats_by_user_id(
        &self,
        user_id: &str,
        limit: usize,
        starting_after: Option<Uuid>,
        ending_before: Option<Uuid>,
    ) -> Result<ChatPage> {
        let chats = self.chats.read();
        let cursor = |id: Uuid| {
            chats
                .get(&id)
                .map(|c| c.created_at)
                .ok_or_else(|| Error::NotFound(format!("chat with id {id}")))
        };

        let filter: Box<dyn Fn(&Chat) -> bool> = match (starting_after, ending_before) {
            (Some(id), _) => {
                let at = cursor(id)?;
                Box::new(move |c: &Chat| c.created_at > at)
            }
            (None, Some(id)) => {
                let at = cursor(id)?;
                Box::new(move |c: &Chat| c.created_at < at)
            }
            (None, None) => Box::new(|_: &Chat| true),
        };

        let mut page: Vec<Chat> = chats
            .values()
            .filter(|c| c.user_id == user_id && filter(c))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let has_more = page.len() > limit;
        page.truncate(limit);
        Ok(ChatPage {
            chats: page,
            has_more,
        })
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut Chat)) -> Result<()> {
        let found = self.mutate(|chats| chats.get_mut(&id).map(f).is_some())?;
        if found {
            Ok(())
        } else {
            Err(Error::NotFound(format!("chat with id {id}")))
        }
    }

    pub fn update_chat_title_by_id(&self, id: Uuid, title: &str) -> Result<()> {
        self.update(id, |c| c.title = title.to_string())
    }

    pub fn update_chat_visibility_by_id(&self, id: Uuid, visibility: Visibility) -> Result<()> {
        self.update(id, |c| c.visibility = visibility)
    }

    pub fn update_chat_last_context_by_id(&self, id: Uuid, context: AppUsage) -> Result<()> {
        self.update(id, |c| c.last_context = Some(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn chat(user: &str, minutes_ago: i64) -> Chat {
        Chat {
            id: Uuid::new_v4(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            title: "New Chat".into(),
            user_id: user.into(),
            visibility: Visibility::Private,
            last_context: None,
        }
    }

    #[test]
    fn pagination_walks_newest_to_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::open(dir.path()).unwrap();
        let chats: Vec<Chat> = (0..5).map(|i| chat("u1", i * 10)).collect();
        for c in &chats {
            store.save_chat(c.clone()).unwrap();
        }
        store.save_chat(chat("u2", 1)).unwrap();

        let first = store.get_chats_by_user_id("u1", 2, None, None).unwrap();
        assert_eq!(first.chats.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.chats[0].id, chats[0].id);
        assert_eq!(first.chats[1].id, chats[1].id);

        let older = store
            .get_chats_by_user_id("u1", 10, None, Some(first.chats[1].id))
            .unwrap();
        assert_eq!(older.chats.len(), 3);
        assert!(!older.has_more);
        assert_eq!(older.chats[0].id, chats[2].id);

        let newer = store
            .get_chats_by_user_id("u1", 10, Some(chats[2].id), None)
            .unwrap();
        assert_eq!(newer.chats.len(), 2);
    }

    #[test]
    fn unknown_cursor_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::open(dir.path()).unwrap();
        let err = store
            .get_chats_by_user_id("u1", 10, Some(Uuid::new_v4()), None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn updates_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let c = chat("u1", 0);
        {
            let store = ChatStore::open(dir.path()).unwrap();
            store.save_chat(c.clone()).unwrap();
            store.update_chat_title_by_id(c.id, "Weather in Berlin").unwrap();
            store
                .update_chat_last_context_by_id(
                    c.id,
                    AppUsage {
                        total_tokens: 42,
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        let store = ChatStore::open(dir.path()).unwrap();
        let loaded = store.get_chat_by_id(c.id).unwrap();
        assert_eq!(loaded.title, "Weather in Berlin");
        assert_eq!(loaded.last_context.unwrap().total_tokens, 42);
    }

    #[test]
    fn update_of_missing_chat_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::open(dir.path()).unwrap();
        assert!(store
            .update_chat_visibility_by_id(Uuid::new_v4(), Visibility::Public)
            .is_err());
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        let store = ChatStore::open(&data).unwrap();
        let kept = chat("alice", 5);
        store.save_chat(kept.clone()).unwrap();

        std::fs::remove_dir_all(&data).unwrap();
        let lost = chat("alice", 1);
        assert!(store.save_chat(lost.clone()).is_err());
        assert!(store.update_chat_title_by_id(kept.id, "Renamed").is_err());

        assert!(store.get_chat_by_id(lost.id).is_none());
        assert_eq!(store.get_chat_by_id(kept.id).unwrap().title, "New Chat");
    }
}
