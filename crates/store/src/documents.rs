//! Artifact documents and their edit suggestions.
//!
//! A document is identified by `id`; every save adds a new version keyed by
//! `(id, created_at)`. Suggestions point at one specific version.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_file;
use rc_domain::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Code,
    Sheet,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Text => "text",
            DocumentKind::Code => "code",
            DocumentKind::Sheet => "sheet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    pub kind: DocumentKind,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_created_at: DateTime<Utc>,
    pub original_text: String,
    pub suggested_text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

pub struct DocumentStore {
    documents_path: PathBuf,
    suggestions_path: PathBuf,
    documents: RwLock<Vec<Document>>,
    suggestions: RwLock<Vec<Suggestion>>,
}

impl DocumentStore {
    pub fn open(dir: &Path) -> Result<Self> {
        let documents_path = dir.join("documents.json");
        let suggestions_path = dir.join("suggestions.json");
        let documents: Vec<Document> = json_file::load(&documents_path)?;
        let suggestions: Vec<Suggestion> = json_file::load(&suggestions_path)?;
        tracing::info!(
            documents = documents.len(),
            suggestions = suggestions.len(),
            "document store loaded"
        );
        Ok(Self {
            documents_path,
            suggestions_path,
            documents: RwLock::new(documents),
            suggestions: RwLock::new(suggestions),
        })
    }

    /// Store a new version of a document.
    pub fn save_document(&self, doc: Document) -> Result<()> {
        let mut docs = self.documents.write();
        let mut next = docs.clone();
        next.push(doc);
        json_file::save(&self.documents_path, &next)?;
        *docs = next;
        Ok(())
    }

    /// Every version of a document, oldest first.
    pub fn get_documents_by_id(&self, id: Uuid) -> Vec<Document> {
        let mut versions: Vec<Document> = self
            .documents
            .read()
            .iter()
            .filter(|d| d.id == id)
            .cloned()
            .collect();
        versions.sort_by_key(|d| d.created_at);
        versions
    }

    /// The latest version of a document.
    pub fn get_document_by_id(&self, id: Uuid) -> Option<Document> {
        self.documents
            .read()
            .iter()
            .filter(|d| d.id == id)
            .max_by_key(|d| d.created_at)
            .cloned()
    }

    /// Drop every version newer than `timestamp`, along with the
    /// suggestions attached to those versions. Returns the removed versions.
    pub fn delete_documents_by_id_after_timestamp(
        &self,
        id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        let removed = {
            let mut docs = self.documents.write();
            let (removed, kept): (Vec<Document>, Vec<Document>) = docs
                .iter()
                .cloned()
                .partition(|d| d.id == id && d.created_at > timestamp);
            if !removed.is_empty() {
                json_file::save(&self.documents_path, &kept)?;
                *docs = kept;
            }
            removed
        };

        if !removed.is_empty() {
            let mut sugg = self.suggestions.write();
            let kept: Vec<Suggestion> = sugg
                .iter()
                .filter(|s| !(s.document_id == id && s.document_created_at > timestamp))
                .cloned()
                .collect();
            if kept.len() != sugg.len() {
                json_file::save(&self.suggestions_path, &kept)?;
                *sugg = kept;
            }
        }
        Ok(removed)
    }

    pub fn save_suggestions(&self, suggestions: Vec<Suggestion>) -> Result<()> {
        if suggestions.is_empty() {
            return Ok(());
        }
        let mut sugg = self.suggestions.write();
        let mut next = sugg.clone();
        next.extend(suggestions);
        json_file::save(&self.suggestions_path, &next)?;
        *sugg = next;
        Ok(())
    }

    pub fn get_suggestions_by_document_id(&self, document_id: Uuid) -> Vec<Suggestion> {
        self.suggestions
            .read()
            .iter()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect()
    }
}
