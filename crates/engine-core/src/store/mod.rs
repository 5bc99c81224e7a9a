mod catalog;
mod lexical_store;
mod review_queue;
mod vector_store;

pub use catalog::DocumentCatalog;
pub use lexical_store::LexicalStore;
pub use review_queue::ReviewQueueStore;
pub use vector_store::{VectorHit, VectorStore};

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{Chunk, ChunkRecord, Document, DocumentOrderBy, DocumentType, MetadataFilter, ReviewItem};

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub by_type: std::collections::HashMap<DocumentType, usize>,
}

/// The persistent catalog of documents, chunks, and review state. Wraps
/// the vector store, the lexical store, and the document/review-queue
/// catalogs behind a single operation surface, applying the shared retry
/// policy to every call that crosses a storage boundary.
pub struct Store {
    vectors: VectorStore,
    lexical: LexicalStore,
    documents: DocumentCatalog,
    reviews: ReviewQueueStore,
    retry_attempts: u32,
}

impl Store {
    pub async fn open(data_dir: &std::path::Path, dimension: usize, config: &StoreConfig) -> EngineResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        let vector_path = data_dir.join("vectors");
        let vectors = VectorStore::new(vector_path.to_string_lossy().as_ref(), dimension)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        let lexical = LexicalStore::new(data_dir.to_string_lossy().as_ref())
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        let documents = DocumentCatalog::open(data_dir).map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        let reviews = ReviewQueueStore::open(data_dir).map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        Ok(Self {
            vectors,
            lexical,
            documents,
            reviews,
            retry_attempts: config.db_retry_attempts,
        })
    }

    /// Retries a transient-failure-prone operation with 1s/2s/4s backoff,
    /// up to the configured attempt count.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut last_err = None;
        for attempt in 0..self.retry_attempts.max(1) {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < self.retry_attempts.max(1) {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(EngineError::StoreUnavailable(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    /// No-op on matching filepath+hash; hash change replaces metadata
    /// (chunks are replaced separately via `replace_chunks`).
    pub fn upsert_document(&self, document: Document) -> EngineResult<(Uuid, bool)> {
        self.documents
            .upsert(document)
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))
    }

    pub fn get_document(&self, id: Uuid) -> Option<Document> {
        self.documents.get(id)
    }

    pub fn list_documents(&self, filter: &MetadataFilter, order_by: DocumentOrderBy, limit: usize, offset: usize) -> Vec<Document> {
        self.documents.list(false, filter, order_by, limit, offset)
    }

    /// Soft-deleted documents become invisible to search; their chunks are
    /// left in place (only the catalog flag changes — hard-delete-and-cascade
    /// is a separate maintenance operation).
    pub fn soft_delete(&self, id: Uuid) -> EngineResult<bool> {
        self.documents.soft_delete(id).map_err(|e| EngineError::StoreUnavailable(e.to_string()))
    }

    /// Augments `auto_tags` (and optionally `summary`, when the document has
    /// none yet) for a document, mutated only by the Auto-tagger. The
    /// write-time lexical vector trigger is re-run since `auto_tags` feeds
    /// the lexical index.
    pub fn augment_auto_tags(&self, id: Uuid, auto_tags: HashSet<String>, summary: Option<String>) -> EngineResult<()> {
        let updated = self
            .documents
            .update(id, |doc| {
                doc.auto_tags.extend(auto_tags);
                if doc.summary.is_none() {
                    doc.summary = summary;
                }
            })
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        if !updated {
            return Err(EngineError::NotFound(id.to_string()));
        }

        if let Some(document) = self.documents.get(id) {
            self.lexical
                .delete_by_document_id(&id.to_string())
                .and_then(|_| self.lexical.index_document(&id.to_string(), &document.lexical_text(), document.namespace.as_deref().unwrap_or("")))
                .and_then(|_| self.lexical.commit())
                .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        }

        Ok(())
    }

    /// Hard-deletes a document and cascades to its chunks. The vector-store
    /// cascade (retried, most likely to fail transiently) runs first so a
    /// failure there leaves the document fully intact rather than dropped
    /// from only one of the two indexes.
    pub async fn hard_delete(&self, id: Uuid) -> EngineResult<usize> {
        let document = self.documents.get(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let removed = self
            .with_retry(|| {
                let id = id.to_string();
                async move { self.vectors.delete_by_document_id(&id).await }
            })
            .await?;

        self.lexical
            .delete_by_document_id(&id.to_string())
            .and_then(|_| self.lexical.commit())
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        self.documents
            .remove(id)
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        let _ = document;
        Ok(removed)
    }

    /// Single-transaction chunk replacement: dense `chunk_index` re-assigned
    /// in emission order, embeddings recorded, lexical entry refreshed.
    pub async fn replace_chunks(&self, document: &Document, chunks: Vec<Chunk>) -> EngineResult<()> {
        self.with_retry(|| {
            let document_id = document.id.to_string();
            async move { self.vectors.delete_by_document_id(&document_id).await }
        })
        .await?;

        let records: Vec<ChunkRecord> = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| ChunkRecord {
                id: chunk.id.to_string(),
                document_id: document.id.to_string(),
                chunk_index: index as u32,
                text: chunk.text.clone(),
                title: document.title.clone(),
                namespace: document.namespace.clone().unwrap_or_default(),
                source_ref: chunk.source_ref.clone().unwrap_or_default(),
                vector: chunk.embedding.clone().unwrap_or_default(),
                created_at: Utc::now().timestamp(),
            })
            .collect();

        self.with_retry(|| {
            let records = records.clone();
            async move { self.vectors.upsert_chunks(records).await }
        })
        .await?;

        self.lexical
            .delete_by_document_id(&document.id.to_string())
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        self.lexical
            .index_document(&document.id.to_string(), &document.lexical_text(), document.namespace.as_deref().unwrap_or(""))
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        self.lexical.commit().map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    /// `plainto_tsquery`-equivalent lexical search over the document index.
    pub async fn lexical_search(&self, query: &str, limit: usize, filter: &MetadataFilter) -> EngineResult<Vec<(Uuid, f32)>> {
        let namespace = filter.namespace.as_deref();
        let hits = self
            .with_retry(|| {
                let query = query.to_string();
                let namespace = namespace.map(|s| s.to_string());
                async move { self.lexical.search(&query, limit, namespace.as_deref()) }
            })
            .await?;

        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| Uuid::parse_str(&id).ok().map(|id| (id, score)))
            .filter(|(id, _)| self.documents.get(*id).map(|d| d.deleted_at.is_none()).unwrap_or(false))
            .collect())
    }

    /// ANN search over chunk embeddings, pre-filtered on the chunk table's
    /// own columns (namespace, created_at) and deduplicated by document
    /// inside the ANN query; soft-deletion and `doc_type` are then enforced
    /// as a post-filter against the document catalog, since neither column
    /// exists on the chunk table itself.
    pub async fn vector_search(&self, embedding: &[f32], limit: usize, filter: &MetadataFilter) -> EngineResult<Vec<VectorHit>> {
        let predicate = filter.to_predicate();
        let hits = self
            .with_retry(|| {
                let predicate = predicate.clone();
                async move { self.vectors.vector_search(embedding, limit, predicate.as_deref()).await }
            })
            .await?;

        let doc_type = filter.doc_type;
        Ok(hits
            .into_iter()
            .filter(|hit| {
                let Ok(document_id) = Uuid::parse_str(&hit.document_id) else {
                    return false;
                };
                match self.documents.get(document_id) {
                    Some(document) => document.deleted_at.is_none() && doc_type.map(|t| t == document.doc_type).unwrap_or(true),
                    None => false,
                }
            })
            .collect())
    }

    pub async fn get_neighbors(&self, document_id: Uuid, chunk_index: u32, window: u32) -> EngineResult<Vec<VectorHit>> {
        self.with_retry(|| {
            let doc_id = document_id.to_string();
            async move { self.vectors.get_neighbors(&doc_id, chunk_index, window).await }
        })
        .await
    }

    /// Representative chunk(s) for a document, used to backfill a lexical-only
    /// hit (lexical search resolves to a document, not a chunk) with text.
    pub async fn chunks_for_document(&self, document_id: Uuid, limit: usize) -> EngineResult<Vec<VectorHit>> {
        self.with_retry(|| {
            let doc_id = document_id.to_string();
            async move { self.vectors.chunks_for_document(&doc_id, limit).await }
        })
        .await
    }

    pub async fn get_by_ids(&self, ids: &[String]) -> EngineResult<Vec<VectorHit>> {
        self.with_retry(|| {
            let ids = ids.to_vec();
            async move { self.vectors.get_by_ids(&ids).await }
        })
        .await
    }

    pub async fn create_index_if_needed(&self) -> EngineResult<()> {
        self.with_retry(|| async { self.vectors.create_index_if_needed().await }).await
    }

    /// Counts for `GET /stats`: total non-deleted documents, total chunks,
    /// and a per-type breakdown.
    pub async fn stats(&self) -> EngineResult<StoreStats> {
        let documents = self.documents.list(false, &MetadataFilter::default(), DocumentOrderBy::default(), usize::MAX, 0);
        let mut by_type: std::collections::HashMap<DocumentType, usize> = std::collections::HashMap::new();
        for document in &documents {
            *by_type.entry(document.doc_type).or_insert(0) += 1;
        }
        let total_chunks = self.with_retry(|| async { self.vectors.count().await }).await.unwrap_or(0);

        Ok(StoreStats {
            total_documents: documents.len(),
            total_chunks,
            by_type,
        })
    }

    pub fn upsert_review(&self, item: ReviewItem) -> EngineResult<()> {
        self.reviews.upsert(item).map_err(|e| EngineError::StoreUnavailable(e.to_string()))
    }

    pub fn get_review(&self, document_id: Uuid) -> Option<ReviewItem> {
        self.reviews.get_by_document(document_id)
    }

    pub fn due_reviews(&self, now: DateTime<Utc>, limit: usize) -> Vec<ReviewItem> {
        self.reviews.due(now, limit)
    }

    pub async fn clear_all(&self) -> EngineResult<()> {
        self.with_retry(|| async { self.vectors.clear().await }).await?;
        self.lexical.clear().map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        self.documents.clear().map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        self.reviews.clear().map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}
