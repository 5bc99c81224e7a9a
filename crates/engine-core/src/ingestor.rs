use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auto_tagger::AutoTagger;
use crate::chunker::{ChunkSource, Chunker};
use crate::embedder::EmbeddingGateway;
use crate::error::{EngineError, EngineResult};
use crate::scheduler::Scheduler;
use crate::store::Store;
use crate::types::{Chunk, Document, DocumentType};
use crate::validator::{validate_title, RejectionReason, Validator};

/// Maximum documents accepted by a single `ingest_batch` call.
pub const MAX_BATCH_DOCUMENTS: usize = 50;

/// Caller-supplied content plus the metadata needed to place it. Content is
/// already-extracted text; source-specific fetching
/// (HTTP scraping, caption/audio retrieval) is an out-of-scope collaborator.
#[derive(Debug, Clone)]
pub struct DocumentSpec {
    pub filepath: String,
    pub doc_type: DocumentType,
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub namespace: Option<String>,
    pub tags: HashSet<String>,
    pub metadata: HashMap<String, String>,
    pub summary: Option<String>,
    /// YouTube caption segments, when the caller already has them split.
    pub youtube_segments: Option<Vec<crate::chunker::CaptionSegment>>,
    /// Per-page text, for PDFs/paginated sources.
    pub pdf_pages: Option<Vec<String>>,
    /// Auto-enqueue an active review item for this document on ingest.
    pub schedule_for_review: bool,
}

impl DocumentSpec {
    fn chunk_source(&self) -> ChunkSource<'_> {
        match self.doc_type {
            DocumentType::Youtube => ChunkSource::Youtube {
                full_text: &self.content,
                segments: self.youtube_segments.as_deref(),
            },
            DocumentType::Bookmark => ChunkSource::Bookmark(&self.content),
            DocumentType::File if self.pdf_pages.is_some() => ChunkSource::Pdf {
                pages: self.pdf_pages.as_deref().unwrap_or_default(),
            },
            _ => ChunkSource::Generic(&self.content),
        }
    }
}

/// Outcome of a single `ingest` call.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// A brand-new document (or a changed re-ingest) was chunked, embedded,
    /// and persisted.
    Ingested { document_id: Uuid, chunks_created: usize },
    /// `content_hash` matched the existing document at this `filepath`; no
    /// writes happened — ingest is idempotent.
    Unchanged { document_id: Uuid },
    /// The title or content failed validation before any write.
    Rejected { reason: RejectionReason },
}

/// Per-document result inside a batch ingest, alongside which input it came
/// from so callers can correlate by position.
#[derive(Debug, Clone)]
pub struct BatchIngestItem {
    pub index: usize,
    pub filepath: String,
    pub outcome: EngineResult<IngestOutcome>,
}

#[derive(Debug, Clone)]
pub struct BatchIngestResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchIngestItem>,
}

/// Orchestrates Validator → Chunker → Embedder → Store. Owns no state
/// beyond references to its collaborators; every call is independently
/// retryable by the caller. Hashes content before chunking so a re-ingest
/// with an unchanged hash short-circuits before any embedding work, and logs
/// a structured completion summary. Batch ingestion isolates each document
/// with `catch_unwind` and records independent per-document outcomes unless
/// `stop_on_error` is set.
pub struct Ingestor {
    validator: Validator,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingGateway>,
    store: Arc<Store>,
    scheduler: Arc<Scheduler>,
    auto_tagger: Option<Arc<AutoTagger>>,
}

impl Ingestor {
    pub fn new(
        validator: Validator,
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingGateway>,
        store: Arc<Store>,
        scheduler: Arc<Scheduler>,
        auto_tagger: Option<Arc<AutoTagger>>,
    ) -> Self {
        Self {
            validator,
            chunker,
            embedder,
            store,
            scheduler,
            auto_tagger,
        }
    }

    /// Validate → hash → upsert (short-circuit if unchanged) → chunk →
    /// embed → replace_chunks → optional review enrollment/auto-tagging.
    pub async fn ingest(&self, spec: DocumentSpec) -> EngineResult<IngestOutcome> {
        if let Err(reason) = validate_title(&spec.title) {
            return Ok(IngestOutcome::Rejected { reason });
        }

        let validation = std::panic::catch_unwind(AssertUnwindSafe(|| self.validator.validate(&spec.content)))
            .unwrap_or(Err(RejectionReason::ErrorPageLike));

        let Ok(()) = validation else {
            let reason = validation.unwrap_err();
            return Ok(IngestOutcome::Rejected { reason });
        };

        let content_hash = hash_content(&spec.content);
        let now = Utc::now();

        let document = Document {
            id: Uuid::new_v4(),
            filepath: spec.filepath.clone(),
            content_hash: content_hash.clone(),
            doc_type: spec.doc_type,
            url: spec.url.clone(),
            title: spec.title.clone(),
            summary: spec.summary.clone(),
            auto_tags: HashSet::new(),
            tags: spec.tags.clone(),
            metadata: spec.metadata.clone(),
            namespace: spec.namespace.clone(),
            quality_score: quality_score(&spec),
            created_at: now,
            updated_at: now,
            captured_at: now,
            deleted_at: None,
        };

        let (document_id, was_new) = self.store.upsert_document(document.clone())?;
        if !was_new {
            return Ok(IngestOutcome::Unchanged { document_id });
        }

        let mut document = document;
        document.id = document_id;

        let drafts = self
            .chunker
            .chunk(&document, spec.chunk_source())
            .map_err(|e| match e {
                EngineError::ChunkingError { document_id, reason } => EngineError::ChunkingError { document_id, reason },
                other => other,
            })?;

        if drafts.is_empty() {
            self.store.replace_chunks(&document, Vec::new()).await?;
            tracing::info!(document_id = %document_id, "ingested document with zero chunks (empty after chunking)");
            return Ok(IngestOutcome::Ingested { document_id, chunks_created: 0 });
        }

        let embed_texts: Vec<String> = drafts.iter().map(|c| self.chunker.embed_text(&document, c)).collect();
        let vectors = self.embedder.embed(&embed_texts).await?;
        if vectors.len() != drafts.len() {
            return Err(EngineError::EmbedderUnavailable(
                "embedder returned a different number of vectors than chunks".to_string(),
            ));
        }

        let model_id = self.embedder.model_id().to_string();
        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .zip(vectors)
            .map(|(mut chunk, embedding)| {
                chunk.embedding = Some(embedding);
                chunk.embedding_model = Some(model_id.clone());
                chunk
            })
            .collect();
        let chunks_created = chunks.len();

        self.store.replace_chunks(&document, chunks).await?;

        if spec.schedule_for_review {
            self.scheduler.add(document_id, now)?;
        }

        if let Some(auto_tagger) = &self.auto_tagger {
            auto_tagger.enqueue(document_id);
        }

        tracing::info!(document_id = %document_id, chunks_created, "ingested document");
        Ok(IngestOutcome::Ingested { document_id, chunks_created })
    }

    /// Batch ingest, bounded to `MAX_BATCH_DOCUMENTS`. When `stop_on_error`
    /// is true, the first per-document error short-circuits the remaining
    /// documents; otherwise every document is attempted independently and
    /// its own outcome recorded.
    pub async fn ingest_batch(&self, specs: Vec<DocumentSpec>, stop_on_error: bool) -> EngineResult<BatchIngestResult> {
        if specs.len() > MAX_BATCH_DOCUMENTS {
            return Err(EngineError::ValidationError(format!(
                "batch ingest accepts at most {MAX_BATCH_DOCUMENTS} documents, got {}",
                specs.len()
            )));
        }

        let mut results = Vec::with_capacity(specs.len());
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for (index, spec) in specs.into_iter().enumerate() {
            let filepath = spec.filepath.clone();
            let outcome = self.ingest(spec).await;

            match &outcome {
                Ok(IngestOutcome::Rejected { .. }) | Err(_) => failed += 1,
                Ok(_) => succeeded += 1,
            }

            let should_stop = stop_on_error && outcome.is_err();
            results.push(BatchIngestItem { index, filepath, outcome });

            if should_stop {
                break;
            }
        }

        Ok(BatchIngestResult {
            total: results.len(),
            succeeded,
            failed,
            results,
        })
    }
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Metadata-completeness quality score (0-100): title, summary, url, tags,
/// and namespace each contribute a fixed share; a document with none of
/// these set scores 0.
fn quality_score(spec: &DocumentSpec) -> u8 {
    let mut score = 0u32;
    if !spec.title.trim().is_empty() {
        score += 20;
    }
    if spec.summary.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        score += 20;
    }
    if spec.url.is_some() {
        score += 15;
    }
    if !spec.tags.is_empty() {
        score += 20;
    }
    if spec.namespace.is_some() {
        score += 10;
    }
    if !spec.metadata.is_empty() {
        score += 15;
    }
    score.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, EmbedderConfig, StoreConfig};
    use crate::types::{DocumentOrderBy, MetadataFilter};
    use async_trait::async_trait;

    struct FixedEmbedder {
        dim: usize,
    }

    #[async_trait]
    impl EmbeddingGateway for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1; self.dim]).collect())
        }
        fn dimension(&self) -> usize {
            self.dim
        }
        fn model_id(&self) -> &str {
            "fixed-test-embedder"
        }
    }

    async fn harness() -> (Ingestor, Arc<Store>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store_config = StoreConfig {
            database_url: String::new(),
            db_pool_min: 2,
            db_pool_max: 10,
            db_pool_timeout_secs: 30,
            db_command_timeout_secs: 30,
            db_retry_attempts: 3,
        };
        let store = Arc::new(Store::open(dir.path(), 8, &store_config).await.unwrap());
        let scheduler = Arc::new(Scheduler::new(store.clone()));
        let embedder: Arc<dyn EmbeddingGateway> = Arc::new(FixedEmbedder { dim: 8 });
        let chunker = Chunker::new(ChunkingConfig {
            youtube_window_secs: 180,
            bookmark_target_tokens: 512,
            bookmark_overlap_ratio: 0.15,
            pdf_page_token_limit: 1_000,
            note_target_tokens: 400,
            note_overlap_ratio: 0.15,
            contextualize: true,
        });
        let _ = EmbedderConfig {
            embedder_url: String::new(),
            embedding_model: String::new(),
            embedding_dim: 8,
            embedding_batch_size: 10,
            embedding_timeout_secs: 30,
            embedder_max_retries: 3,
        };
        let ingestor = Ingestor::new(Validator::new(100), chunker, embedder, store.clone(), scheduler, None);
        (ingestor, store, dir)
    }

    fn note_spec(filepath: &str, content: &str) -> DocumentSpec {
        DocumentSpec {
            filepath: filepath.to_string(),
            doc_type: DocumentType::Note,
            title: "A".to_string(),
            content: content.to_string(),
            url: None,
            namespace: None,
            tags: HashSet::new(),
            metadata: HashMap::new(),
            summary: None,
            youtube_segments: None,
            pdf_pages: None,
            schedule_for_review: false,
        }
    }

    #[tokio::test]
    async fn ingesting_the_same_content_twice_is_idempotent() {
        let (ingestor, store, _dir) = harness().await;
        let content = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(3);

        let first = ingestor.ingest(note_spec("notes/a.md", &content)).await.unwrap();
        let IngestOutcome::Ingested { document_id, chunks_created } = first else {
            panic!("expected Ingested, got {first:?}");
        };
        assert_eq!(chunks_created, 1);

        let second = ingestor.ingest(note_spec("notes/a.md", &content)).await.unwrap();
        let IngestOutcome::Unchanged { document_id: second_id } = second else {
            panic!("expected Unchanged, got {second:?}");
        };
        assert_eq!(document_id, second_id);

        assert_eq!(store.list_documents(&MetadataFilter::default(), DocumentOrderBy::default(), 100, 0).len(), 1);
    }

    #[tokio::test]
    async fn validator_rejection_writes_nothing() {
        let (ingestor, store, _dir) = harness().await;
        let outcome = ingestor.ingest(note_spec("x", "404 Not Found")).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Rejected { reason: RejectionReason::ErrorPageLike }));
        assert_eq!(store.list_documents(&MetadataFilter::default(), DocumentOrderBy::default(), 100, 0).len(), 0);
    }

    #[tokio::test]
    async fn empty_title_is_rejected_before_content_is_touched() {
        let (ingestor, store, _dir) = harness().await;
        let mut spec = note_spec("notes/a.md", &"Lorem ipsum dolor sit amet consectetur. ".repeat(3));
        spec.title = "   ".to_string();
        let outcome = ingestor.ingest(spec).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Rejected { reason: RejectionReason::InvalidTitle }));
        assert_eq!(store.list_documents(&MetadataFilter::default(), DocumentOrderBy::default(), 100, 0).len(), 0);
    }

    #[tokio::test]
    async fn overlong_title_is_rejected() {
        let (ingestor, _store, _dir) = harness().await;
        let mut spec = note_spec("notes/a.md", &"Lorem ipsum dolor sit amet consectetur. ".repeat(3));
        spec.title = "a".repeat(501);
        let outcome = ingestor.ingest(spec).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Rejected { reason: RejectionReason::InvalidTitle }));
    }

    #[tokio::test]
    async fn batch_ingest_enforces_the_title_invariant_for_every_document() {
        let (ingestor, _store, _dir) = harness().await;
        let mut bad_title = note_spec("notes/a.md", &"Lorem ipsum dolor sit amet consectetur. ".repeat(3));
        bad_title.title = String::new();
        let specs = vec![bad_title, note_spec("notes/b.md", &"Lorem ipsum dolor sit amet. ".repeat(5))];
        let result = ingestor.ingest_batch(specs, false).await.unwrap();

        assert_eq!(result.total, 2);
        assert!(matches!(
            result.results[0].outcome.as_ref().unwrap(),
            IngestOutcome::Rejected { reason: RejectionReason::InvalidTitle }
        ));
        assert!(matches!(result.results[1].outcome.as_ref().unwrap(), IngestOutcome::Ingested { .. }));
    }

    #[tokio::test]
    async fn batch_ingest_rejects_over_the_document_limit() {
        let (ingestor, _store, _dir) = harness().await;
        let specs = (0..MAX_BATCH_DOCUMENTS + 1)
            .map(|i| note_spec(&format!("notes/{i}.md"), "Lorem ipsum dolor sit amet consectetur. ".repeat(3).as_str()))
            .collect();
        let result = ingestor.ingest_batch(specs, false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn batch_ingest_continues_past_a_rejected_document_when_not_stopping_on_error() {
        let (ingestor, _store, _dir) = harness().await;
        let specs = vec![note_spec("x", "404 Not Found"), note_spec("notes/b.md", &"Lorem ipsum dolor sit amet. ".repeat(5))];
        let result = ingestor.ingest_batch(specs, false).await.unwrap();

        assert_eq!(result.total, 2);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert!(matches!(result.results[0].outcome.as_ref().unwrap(), IngestOutcome::Rejected { .. }));
        assert!(matches!(result.results[1].outcome.as_ref().unwrap(), IngestOutcome::Ingested { .. }));
    }
}
