pub mod auto_tagger;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod error;
pub mod ingestor;
pub mod llm;
pub mod qa;
pub mod reranker;
pub mod scheduler;
pub mod search;
pub mod store;
pub mod types;
pub mod validator;

pub use auto_tagger::AutoTagger;
pub use chunker::{CaptionSegment, Chunker};
pub use config::EngineConfig;
pub use embedder::{EmbeddingGateway, HttpEmbedder};
pub use llm::{HttpLlmProvider, LlmProvider, ProviderKind, TieredLlmGateway};
pub use reranker::{HttpReranker, RerankerGateway};
pub use error::{EngineError, EngineResult};
pub use ingestor::{BatchIngestResult, DocumentSpec, IngestOutcome, Ingestor};
pub use qa::{QaEngine, QaResult};
pub use scheduler::{Rating, Scheduler};
pub use search::{Cache, SearchEngine, SearchOptions, SearchResult, SearchWeights};
pub use store::{Store, StoreStats};
pub use types::{Chunk, ChunkRecord, Document, DocumentOrderBy, DocumentType, MetadataFilter, ReviewItem};
pub use validator::{RejectionReason, Validator};

pub use anyhow::{Error, Result};
pub use uuid::Uuid;
