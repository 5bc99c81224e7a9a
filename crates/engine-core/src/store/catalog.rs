use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{Document, DocumentOrderBy, MetadataFilter};

/// Document metadata catalog, snapshotted to `documents.json` on every
/// mutation. A single-user, single-process deployment (Non-goals: no
/// multi-tenant or distributed operation) makes a whole-file rewrite on
/// write an acceptable simplification over a relational engine.
pub struct DocumentCatalog {
    path: PathBuf,
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl DocumentCatalog {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("documents.json");
        let documents = if path.exists() {
            let content = std::fs::read_to_string(&path).context("failed to read document catalog")?;
            serde_json::from_str(&content).context("failed to parse document catalog")?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            documents: RwLock::new(documents),
        })
    }

    fn persist(&self, documents: &HashMap<Uuid, Document>) -> Result<()> {
        let content = serde_json::to_string(documents).context("failed to serialize document catalog")?;
        std::fs::write(&self.path, content).context("failed to write document catalog")?;
        Ok(())
    }

    /// Implements the upsert-by-filepath rule: an existing non-deleted
    /// document with matching filepath and hash is a no-op; matching
    /// filepath with a different hash replaces metadata in place.
    pub fn upsert(&self, mut document: Document) -> Result<(Uuid, bool)> {
        let mut guard = self.documents.write();

        if let Some(existing) = guard
            .values()
            .find(|d| d.deleted_at.is_none() && d.filepath == document.filepath)
        {
            if existing.content_hash == document.content_hash {
                return Ok((existing.id, false));
            }
            let id = existing.id;
            document.id = id;
            document.created_at = existing.created_at;
            document.updated_at = Utc::now();
            guard.insert(id, document);
            self.persist(&guard)?;
            return Ok((id, true));
        }

        let id = document.id;
        guard.insert(id, document);
        self.persist(&guard)?;
        Ok((id, true))
    }

    pub fn get(&self, id: Uuid) -> Option<Document> {
        self.documents.read().get(&id).cloned()
    }

    pub fn list(
        &self,
        include_deleted: bool,
        filter: &MetadataFilter,
        order_by: DocumentOrderBy,
        limit: usize,
        offset: usize,
    ) -> Vec<Document> {
        let guard = self.documents.read();
        let mut docs: Vec<Document> = guard
            .values()
            .filter(|d| (include_deleted || d.deleted_at.is_none()) && filter.matches_document(d))
            .cloned()
            .collect();
        match order_by {
            DocumentOrderBy::CreatedAtDesc => docs.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            DocumentOrderBy::CreatedAtAsc => docs.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            DocumentOrderBy::UpdatedAtDesc => docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
            DocumentOrderBy::TitleAsc => docs.sort_by(|a, b| a.title.cmp(&b.title)),
        }
        docs.into_iter().skip(offset).take(limit).collect()
    }

    pub fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let mut guard = self.documents.write();
        let Some(doc) = guard.get_mut(&id) else {
            return Ok(false);
        };
        doc.deleted_at = Some(Utc::now());
        doc.updated_at = Utc::now();
        self.persist(&guard)?;
        Ok(true)
    }

    pub fn update<F: FnOnce(&mut Document)>(&self, id: Uuid, f: F) -> Result<bool> {
        let mut guard = self.documents.write();
        let Some(doc) = guard.get_mut(&id) else {
            return Ok(false);
        };
        f(doc);
        doc.updated_at = Utc::now();
        self.persist(&guard)?;
        Ok(true)
    }

    /// Fully removes a document row (used by hard-delete cascades).
    pub fn remove(&self, id: Uuid) -> Result<bool> {
        let mut guard = self.documents.write();
        let removed = guard.remove(&id).is_some();
        if removed {
            self.persist(&guard)?;
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        let mut guard = self.documents.write();
        guard.clear();
        self.persist(&guard)
    }
}
