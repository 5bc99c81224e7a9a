use std::sync::Arc;

use engine_core::{
    AutoTagger, Cache, EngineConfig, HttpEmbedder, HttpLlmProvider, HttpReranker, Ingestor, ProviderKind, QaEngine, RerankerGateway,
    Scheduler, SearchEngine, Store, TieredLlmGateway, Validator,
};

use crate::config::ServerConfig;

/// Every service the route handlers need, composed once at startup:
/// explicitly-constructed services passed by reference, no global
/// singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub store: Arc<Store>,
    pub search: Arc<SearchEngine>,
    pub qa: Arc<QaEngine>,
    pub scheduler: Arc<Scheduler>,
    pub ingestor: Arc<Ingestor>,
    pub api_key: Option<String>,
}

impl AppState {
    pub async fn new(server_config: ServerConfig) -> anyhow::Result<Self> {
        let config = server_config.engine;
        config.validate().map_err(|e| anyhow::anyhow!(e))?;

        let store = Arc::new(Store::open(&config.data_dir, config.embedder.embedding_dim, &config.store).await?);
        store.create_index_if_needed().await.ok();

        let embedder: Arc<dyn engine_core::EmbeddingGateway> = Arc::new(HttpEmbedder::new(&config.embedder));
        let reranker: Option<Arc<dyn RerankerGateway>> = HttpReranker::new(&config.reranker).map(|r| Arc::new(r) as Arc<dyn RerankerGateway>);
        let cache = Arc::new(Cache::new(config.cache.clone()).await);

        let search = Arc::new(SearchEngine::new(
            store.clone(),
            embedder.clone(),
            reranker,
            cache,
            &config.search,
            config.reranker.rerank_candidate_count,
        ));

        let providers: Vec<Box<dyn engine_core::LlmProvider>> = config
            .llm
            .llm_providers
            .iter()
            .map(|spec| {
                let (kind, model) = ProviderKind::parse(spec);
                let api_key = api_key_for(&kind);
                Box::new(HttpLlmProvider::new(kind, None, api_key, model)) as Box<dyn engine_core::LlmProvider>
            })
            .collect();
        let llm = Arc::new(TieredLlmGateway::new(providers, config.llm.llm_timeout_secs));

        let qa = Arc::new(QaEngine::new(search.clone(), llm.clone()));
        let scheduler = Arc::new(Scheduler::new(store.clone()));

        let auto_tagger = if config.llm.llm_providers.is_empty() {
            None
        } else {
            Some(Arc::new(AutoTagger::new(store.clone(), llm.clone())))
        };

        let validator = Validator::new(100);
        let chunker = engine_core::Chunker::new(config.chunking.clone());
        let ingestor = Arc::new(Ingestor::new(validator, chunker, embedder, store.clone(), scheduler.clone(), auto_tagger));

        Ok(Self {
            config: Arc::new(config),
            store,
            search,
            qa,
            scheduler,
            ingestor,
            api_key: server_config.api_key,
        })
    }
}

/// API keys for each provider tier come from the environment, named by
/// provider (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`); custom endpoints fall
/// back to a shared `LLM_API_KEY`.
fn api_key_for(kind: &ProviderKind) -> String {
    let var = match kind {
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::Custom => "LLM_API_KEY",
    };
    std::env::var(var).unwrap_or_default()
}
