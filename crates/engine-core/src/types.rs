use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ingested artifact: a web bookmark, a video transcript, a local file, a
/// freeform note, or a scheduler-visible capture/pattern/decision record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filepath: String,
    pub content_hash: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub url: Option<String>,
    pub title: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub auto_tags: HashSet<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub quality_score: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub captured_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Lexical index text maintained at write time from {title, summary, tags, auto_tags}.
    pub fn lexical_text(&self) -> String {
        let mut parts = vec![self.title.clone()];
        if let Some(summary) = &self.summary {
            parts.push(summary.clone());
        }
        parts.extend(self.tags.iter().cloned());
        parts.extend(self.auto_tags.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Youtube,
    Bookmark,
    File,
    Note,
    Capture,
    Pattern,
    Decision,
}

/// A retrieval unit belonging to exactly one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
    pub source_ref: Option<String>,
    pub start_char: Option<u32>,
    pub end_char: Option<u32>,
}

pub const MAX_CHUNK_CHARS: usize = 10_000;

/// Zero-or-one per document; tracks spaced-repetition scheduling state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: Uuid,
    pub document_id: Uuid,
    pub fsrs_state: FsrsState,
    pub next_review: Option<DateTime<Utc>>,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub review_count: u32,
    pub status: ReviewStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Active,
    Archived,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsrsLearningState {
    New,
    Learning,
    Review,
    Relearning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FsrsState {
    pub stability: f64,
    pub difficulty: f64,
    pub elapsed_days: f64,
    pub scheduled_days: f64,
    pub reps: u32,
    pub lapses: u32,
    pub state: FsrsLearningState,
    pub last_review: Option<DateTime<Utc>>,
}

/// Filter shared by lexical search, vector search, and listing operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub namespace: Option<String>,
    pub doc_type: Option<DocumentType>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Sort order for `list_documents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrderBy {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
    UpdatedAtDesc,
    TitleAsc,
}

impl MetadataFilter {
    /// Builds a SQL-style predicate over the chunk table's own columns
    /// (`namespace`, `created_at`): the chunk table carries no `deleted_at`
    /// or `doc_type` column, so those two are enforced by the `Store` as a
    /// post-filter against the document catalog instead, the same way
    /// `lexical_search` already does.
    pub fn to_predicate(&self) -> Option<String> {
        let mut predicates = Vec::new();

        if let Some(ref ns) = self.namespace {
            let escaped = ns.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_").replace('\'', "''");
            predicates.push(format!("namespace LIKE '{escaped}%' ESCAPE '\\'"));
        }
        if let Some(from) = self.date_from {
            predicates.push(format!("created_at >= {}", from.timestamp()));
        }
        if let Some(to) = self.date_to {
            predicates.push(format!("created_at <= {}", to.timestamp()));
        }

        if predicates.is_empty() {
            None
        } else {
            Some(predicates.join(" AND "))
        }
    }

    /// Applies the same filter fields against a full `Document` row, for
    /// callers (like `list_documents`) that filter in-process rather than
    /// pushing the predicate down into a query.
    pub fn matches_document(&self, document: &Document) -> bool {
        if let Some(ns) = &self.namespace {
            let matches_ns = document.namespace.as_deref().is_some_and(|doc_ns| doc_ns.starts_with(ns.as_str()));
            if !matches_ns {
                return false;
            }
        }
        if let Some(doc_type) = self.doc_type {
            if document.doc_type != doc_type {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if document.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if document.created_at > to {
                return false;
            }
        }
        true
    }
}

/// Storage-layer representation of a chunk row, flattened for Arrow/Tantivy
/// writes (mirrors the fields actually persisted, as opposed to the richer
/// in-memory `Chunk`).
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub title: String,
    pub namespace: String,
    pub source_ref: String,
    pub vector: Vec<f32>,
    pub created_at: i64,
}
