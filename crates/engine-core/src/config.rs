use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub store: StoreConfig,
    pub embedder: EmbedderConfig,
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub reranker: RerankerConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
    pub db_pool_min: usize,
    pub db_pool_max: usize,
    pub db_pool_timeout_secs: u64,
    pub db_command_timeout_secs: u64,
    pub db_retry_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub embedder_url: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub embedding_batch_size: usize,
    pub embedding_timeout_secs: u64,
    pub embedder_max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub youtube_window_secs: u64,
    pub bookmark_target_tokens: usize,
    pub bookmark_overlap_ratio: f32,
    pub pdf_page_token_limit: usize,
    pub note_target_tokens: usize,
    pub note_overlap_ratio: f32,
    /// Prepend a `Document: "{title}". Source: {source}. Section: {section}.`
    /// prefix to the text handed to the embedder, while the Store keeps the
    /// unprefixed text for display.
    pub contextualize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub bm25_weight: f32,
    pub vector_weight: f32,
    pub rrf_k: u32,
    pub bm25_candidates: usize,
    pub vector_candidates: usize,
    pub search_default_limit: usize,
    pub search_max_limit: usize,
    pub quality_boost_alpha: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub reranker_url: Option<String>,
    pub rerank_candidate_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm_providers: Vec<String>,
    pub llm_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub cache_url: Option<String>,
    pub search_ttl_secs: u64,
    pub embedding_ttl_secs: u64,
    pub rerank_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub review_session_size: usize,
}

impl EngineConfig {
    /// Validates cross-field rules shared by every operation.
    pub fn validate(&self) -> Result<(), String> {
        if self.search.search_default_limit > self.search.search_max_limit {
            return Err("search.search_default_limit must be <= search_max_limit".into());
        }
        if self.search.bm25_weight + self.search.vector_weight <= 0.0 {
            return Err("search.bm25_weight + vector_weight must be > 0".into());
        }
        if self.store.db_pool_min > self.store.db_pool_max {
            return Err("store.db_pool_min must be <= db_pool_max".into());
        }
        if self.embedder.embedding_dim == 0 {
            return Err("embedder.embedding_dim must be > 0".into());
        }
        if self.embedder.embedding_batch_size == 0 {
            return Err("embedder.embedding_batch_size must be > 0".into());
        }
        Ok(())
    }

    /// Loads config from a JSON file, then re-validates.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file: {e}"))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| format!("failed to parse config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config from environment variables, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            config.store.database_url = v;
        }
        if let Ok(v) = std::env::var("EMBEDDER_URL") {
            config.embedder.embedder_url = v;
        }
        if let Ok(v) = std::env::var("EMBEDDING_DIM") {
            if let Ok(n) = v.parse() {
                config.embedder.embedding_dim = n;
            }
        }
        if let Ok(v) = std::env::var("RERANKER_URL") {
            config.reranker.reranker_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_PROVIDERS") {
            config.llm.llm_providers = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = std::env::var("CACHE_URL") {
            config.cache.cache_url = Some(v);
        }

        config
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activation-engine");

        Self {
            store: StoreConfig {
                database_url: data_dir.join("store").to_string_lossy().to_string(),
                db_pool_min: 2,
                db_pool_max: 10,
                db_pool_timeout_secs: 30,
                db_command_timeout_secs: 30,
                db_retry_attempts: 3,
            },
            embedder: EmbedderConfig {
                embedder_url: "http://localhost:8081/embed".to_string(),
                embedding_model: "default".to_string(),
                embedding_dim: 768,
                embedding_batch_size: 10,
                embedding_timeout_secs: 30,
                embedder_max_retries: 3,
            },
            chunking: ChunkingConfig {
                youtube_window_secs: 180,
                bookmark_target_tokens: 512,
                bookmark_overlap_ratio: 0.15,
                pdf_page_token_limit: 1_000,
                note_target_tokens: 400,
                note_overlap_ratio: 0.15,
                contextualize: true,
            },
            search: SearchConfig {
                bm25_weight: 0.5,
                vector_weight: 0.5,
                rrf_k: 60,
                bm25_candidates: 50,
                vector_candidates: 50,
                search_default_limit: 10,
                search_max_limit: 100,
                quality_boost_alpha: 0.05,
            },
            reranker: RerankerConfig {
                reranker_url: None,
                rerank_candidate_count: 20,
            },
            llm: LlmConfig {
                llm_providers: Vec::new(),
                llm_timeout_secs: 60,
            },
            cache: CacheConfig {
                cache_url: None,
                search_ttl_secs: 5 * 60,
                embedding_ttl_secs: 24 * 60 * 60,
                rerank_ttl_secs: 10 * 60,
            },
            scheduler: SchedulerConfig {
                review_session_size: 20,
            },
            data_dir,
        }
    }
}
