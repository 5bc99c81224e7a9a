use thiserror::Error;

/// Error taxonomy for the engine. These are error *kinds*, not literal HTTP
/// status codes — the server crate maps each variant to a status and a
/// sanitized body.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Ingest is idempotent: a duplicate `content_hash` for the same
    /// `filepath` returns the existing document id rather than failing.
    #[error("duplicate content for existing document {0}")]
    DuplicateContent(uuid::Uuid),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store connection pool exhausted")]
    ConnectionExhausted,

    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("reranker unavailable: {0}")]
    RerankerUnavailable(String),

    #[error("llm unavailable: {0}")]
    LlmUnavailable(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("chunking failed for document {document_id}: {reason}")]
    ChunkingError { document_id: uuid::Uuid, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Whether a caller should retry the *same* request later. Gateways use
    /// this to decide escalation (LLM tiers) vs. immediate surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_)
                | EngineError::ConnectionExhausted
                | EngineError::EmbedderUnavailable(_)
                | EngineError::RerankerUnavailable(_)
                | EngineError::LlmUnavailable(_)
                | EngineError::RateLimited { .. }
        )
    }
}
