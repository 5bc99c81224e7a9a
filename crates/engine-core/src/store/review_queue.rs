use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{ReviewItem, ReviewStatus};

/// Review-state table, snapshotted to `review_queue.json`. Same persistence
/// idiom as `DocumentCatalog`; kept as a separate file so review state and
/// document metadata can evolve independently.
pub struct ReviewQueueStore {
    path: PathBuf,
    items: RwLock<HashMap<Uuid, ReviewItem>>,
}

impl ReviewQueueStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("review_queue.json");
        let items = if path.exists() {
            let content = std::fs::read_to_string(&path).context("failed to read review queue")?;
            serde_json::from_str(&content).context("failed to parse review queue")?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    fn persist(&self, items: &HashMap<Uuid, ReviewItem>) -> Result<()> {
        let content = serde_json::to_string(items).context("failed to serialize review queue")?;
        std::fs::write(&self.path, content).context("failed to write review queue")?;
        Ok(())
    }

    pub fn get_by_document(&self, document_id: Uuid) -> Option<ReviewItem> {
        self.items
            .read()
            .values()
            .find(|i| i.document_id == document_id)
            .cloned()
    }

    pub fn upsert(&self, item: ReviewItem) -> Result<()> {
        let mut guard = self.items.write();
        guard.insert(item.id, item);
        self.persist(&guard)
    }

    /// `status=active ∧ next_review ≤ now`, ordered by `next_review ASC`.
    pub fn due(&self, now: DateTime<Utc>, limit: usize) -> Vec<ReviewItem> {
        let guard = self.items.read();
        let mut due: Vec<ReviewItem> = guard
            .values()
            .filter(|i| i.status == ReviewStatus::Active)
            .filter(|i| i.next_review.map(|nr| nr <= now).unwrap_or(false))
            .cloned()
            .collect();
        due.sort_by_key(|i| i.next_review);
        due.into_iter().take(limit).collect()
    }

    pub fn clear(&self) -> Result<()> {
        let mut guard = self.items.write();
        guard.clear();
        self.persist(&guard)
    }
}
