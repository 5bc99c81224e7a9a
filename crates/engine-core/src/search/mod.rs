mod cache;
mod query_expander;

pub use cache::{Cache, CacheClass};
pub use query_expander::QueryExpander;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::embedder::EmbeddingGateway;
use crate::error::EngineResult;
use crate::reranker::RerankerGateway;
use crate::store::{Store, VectorHit};
use crate::types::MetadataFilter;

/// Tunable weights behind a lock-free `ArcSwap`: `PATCH
/// /tuning/weights` publishes a new snapshot without ever blocking a search
/// in flight.
#[derive(Debug, Clone)]
pub struct SearchWeights {
    pub bm25_weight: f32,
    pub vector_weight: f32,
    pub rrf_k: u32,
    pub quality_boost_alpha: f32,
}

impl From<&SearchConfig> for SearchWeights {
    fn from(config: &SearchConfig) -> Self {
        Self {
            bm25_weight: config.bm25_weight,
            vector_weight: config.vector_weight,
            rrf_k: config.rrf_k,
            quality_boost_alpha: config.quality_boost_alpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitSource {
    Lexical,
    Vector,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Full,
    LexicalOnly,
    VectorOnly,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: Uuid,
    pub chunk_id: Option<String>,
    pub chunk_index: Option<u32>,
    pub title: String,
    pub text: String,
    pub source_ref: Option<String>,
    pub score: f32,
    pub source: HitSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub hits: Vec<SearchHit>,
    pub mode: SearchMode,
    pub degraded: bool,
    pub reranked: bool,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub namespace: Option<String>,
    pub rerank: bool,
    pub use_cache: bool,
    /// Parent-child neighbor expansion: pad `text` with the
    /// ±1 neighboring chunk. Off by default so ordering stays exactly what
    /// S3 expects.
    pub expand_context: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            namespace: None,
            rerank: false,
            use_cache: true,
            expand_context: false,
        }
    }
}

/// Jaccard word-overlap threshold above which a later hit is suppressed as a
/// near-duplicate of one already kept.
const NEAR_DUPLICATE_THRESHOLD: f64 = 0.75;
/// Penalty applied to a hit's score per prior hit from the same document
/// already kept in the result (MMR-style diversity).
const DIVERSITY_LAMBDA: f32 = 0.85;

/// Hybrid retrieval pipeline: lexical + vector arms fused by RRF,
/// quality-boosted, optionally cross-encoder reranked, cached end to end.
pub struct SearchEngine {
    store: Arc<Store>,
    embedder: Arc<dyn EmbeddingGateway>,
    reranker: Option<Arc<dyn RerankerGateway>>,
    cache: Arc<Cache>,
    expander: QueryExpander,
    weights: ArcSwap<SearchWeights>,
    bm25_candidates: usize,
    vector_candidates: usize,
    rerank_candidate_count: usize,
    search_max_limit: usize,
}

impl SearchEngine {
    pub fn new(
        store: Arc<Store>,
        embedder: Arc<dyn EmbeddingGateway>,
        reranker: Option<Arc<dyn RerankerGateway>>,
        cache: Arc<Cache>,
        config: &SearchConfig,
        rerank_candidate_count: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            reranker,
            cache,
            expander: QueryExpander::new(),
            weights: ArcSwap::from_pointee(SearchWeights::from(config)),
            bm25_candidates: config.bm25_candidates,
            vector_candidates: config.vector_candidates,
            rerank_candidate_count,
            search_max_limit: config.search_max_limit,
        }
    }

    pub fn weights(&self) -> Arc<SearchWeights> {
        self.weights.load_full()
    }

    /// Publishes new weights and bumps the search cache namespace so stale
    /// results computed under the old weights are never served.
    pub fn update_weights(&self, weights: SearchWeights) {
        self.weights.store(Arc::new(weights));
        self.cache.invalidate_search_namespace();
    }

    pub async fn hybrid_search(&self, query: &str, options: &SearchOptions) -> EngineResult<SearchResult> {
        let limit = options.limit.clamp(1, self.search_max_limit);
        let weights = self.weights.load_full();

        let cache_key = cache::fingerprint(&[
            &cache::normalize_query(query),
            &limit.to_string(),
            options.namespace.as_deref().unwrap_or(""),
            &options.rerank.to_string(),
            &format!("{}:{}:{}", weights.bm25_weight, weights.vector_weight, weights.rrf_k),
        ]);

        if options.use_cache {
            if let Some(cached) = self.cache.get(CacheClass::Search, &cache_key).await {
                if let Ok(result) = serde_json::from_str::<SearchResult>(&cached) {
                    return Ok(result);
                }
            }
        }

        let filter = MetadataFilter {
            namespace: options.namespace.clone(),
            ..Default::default()
        };

        let expanded_query = self.expander.expand(query);
        let lexical_result = self.store.lexical_search(&expanded_query, self.bm25_candidates, &filter).await;
        let lexical_ok = lexical_result.is_ok();
        let lexical_hits: Vec<(Uuid, f32)> = lexical_result.unwrap_or_default();

        let (vector_ok, vector_hits) = match self.embedder.embed(std::slice::from_ref(&query.to_string())).await {
            Ok(mut vectors) if !vectors.is_empty() => {
                let embedding = vectors.remove(0);
                match self.store.vector_search(&embedding, self.vector_candidates, &filter).await {
                    Ok(hits) => (true, hits),
                    Err(_) => (false, Vec::new()),
                }
            }
            _ => (false, Vec::new()),
        };

        let mode = match (lexical_ok, vector_ok) {
            (true, true) => SearchMode::Full,
            (true, false) => SearchMode::LexicalOnly,
            (false, true) => SearchMode::VectorOnly,
            (false, false) => SearchMode::Degraded,
        };
        let degraded = mode != SearchMode::Full;

        // Step 4: RRF fusion, 1-based rank via `rank_index + 1`.
        let mut fused: HashMap<Uuid, (f32, HitSource)> = HashMap::new();
        for (rank, (document_id, _)) in lexical_hits.iter().enumerate() {
            let rrf = weights.bm25_weight / (weights.rrf_k as f32 + rank as f32 + 1.0);
            fused
                .entry(*document_id)
                .and_modify(|(s, src)| {
                    *s += rrf;
                    *src = HitSource::Both;
                })
                .or_insert((rrf, HitSource::Lexical));
        }

        let mut vector_hit_by_doc: HashMap<Uuid, VectorHit> = HashMap::new();
        for (rank, hit) in vector_hits.into_iter().enumerate() {
            let Ok(document_id) = Uuid::parse_str(&hit.document_id) else {
                continue;
            };
            let rrf = weights.vector_weight / (weights.rrf_k as f32 + rank as f32 + 1.0);
            fused
                .entry(document_id)
                .and_modify(|(s, src)| {
                    *s += rrf;
                    *src = HitSource::Both;
                })
                .or_insert((rrf, HitSource::Vector));
            vector_hit_by_doc.entry(document_id).or_insert(hit);
        }

        // Backfill lexical-only hits with a representative chunk so every
        // fused result has text to show and rerank.
        let lexical_only_ids: Vec<Uuid> = fused.keys().filter(|id| !vector_hit_by_doc.contains_key(id)).copied().collect();
        for document_id in lexical_only_ids {
            if let Ok(mut chunks) = self.store.chunks_for_document(document_id, 1).await {
                if let Some(chunk) = chunks.pop() {
                    vector_hit_by_doc.insert(document_id, chunk);
                }
            }
        }

        // Step 5: quality boost.
        let mut scored: Vec<(Uuid, f32, HitSource)> = fused
            .into_iter()
            .filter(|(id, _)| vector_hit_by_doc.contains_key(id))
            .map(|(id, (score, source))| {
                let quality = self.store.get_document(id).map(|d| d.quality_score).unwrap_or(0);
                let boosted = score * (1.0 + weights.quality_boost_alpha * quality as f32 / 100.0);
                (id, boosted, source)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        // Step 6: truncate to max(limit, rerank candidate count) when a
        // rerank pass will run, else straight to limit.
        let pre_rerank_limit = if options.rerank && self.reranker.is_some() {
            limit.max(self.rerank_candidate_count)
        } else {
            limit
        };
        scored.truncate(pre_rerank_limit);

        // Step 7: optional rerank, tie-break on fused score, graceful
        // degrade to fused order whenever the reranker is absent or fails
        // (reranker unavailability is non-fatal but degradation-worthy).
        let mut reranked = false;
        let mut rerank_degraded = false;
        if options.rerank {
            if let Some(reranker) = &self.reranker {
                let passages: Vec<String> = scored
                    .iter()
                    .map(|(id, _, _)| vector_hit_by_doc.get(id).map(|h| h.text.clone()).unwrap_or_default())
                    .collect();

                match reranker.rerank(query, &passages).await {
                    Ok(rerank_scores) if rerank_scores.len() == scored.len() => {
                        let mut combined: Vec<(Uuid, f32, f32, HitSource)> = scored
                            .iter()
                            .zip(rerank_scores)
                            .map(|((id, fused_score, src), rs)| (*id, rs, *fused_score, *src))
                            .collect();
                        combined.sort_by(|a, b| {
                            b.1.partial_cmp(&a.1)
                                .unwrap_or(Ordering::Equal)
                                .then_with(|| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal))
                        });
                        scored = combined.into_iter().map(|(id, rs, _, src)| (id, rs, src)).collect();
                        reranked = true;
                    }
                    _ => rerank_degraded = true,
                }
            } else {
                rerank_degraded = true;
            }
        }

        // Supplement: near-duplicate suppression + same-document diversity
        // penalty, strictly after rerank and before the final truncate so
        // neither touches the RRF arithmetic that S3 pins down.
        let scored = suppress_near_duplicates_and_diversify(scored, &vector_hit_by_doc);
        let mut scored = scored;
        scored.truncate(limit);

        let mut hits = Vec::with_capacity(scored.len());
        for (document_id, score, source) in scored {
            let Some(vhit) = vector_hit_by_doc.get(&document_id) else {
                continue;
            };
            let mut text = vhit.text.clone();

            if options.expand_context {
                if let Ok(neighbors) = self.store.get_neighbors(document_id, vhit.chunk_index, 1).await {
                    if !neighbors.is_empty() {
                        let mut parts: Vec<(u32, String)> = neighbors.iter().map(|n| (n.chunk_index, n.text.clone())).collect();
                        parts.push((vhit.chunk_index, text.clone()));
                        parts.sort_by_key(|(index, _)| *index);
                        text = parts.into_iter().map(|(_, t)| t).collect::<Vec<_>>().join("\n\n");
                    }
                }
            }

            let source_ref = if vhit.source_ref.is_empty() { None } else { Some(vhit.source_ref.clone()) };
            hits.push(SearchHit {
                document_id,
                chunk_id: Some(vhit.id.clone()),
                chunk_index: Some(vhit.chunk_index),
                title: vhit.title.clone(),
                text,
                source_ref,
                score,
                source,
            });
        }

        let degraded = degraded || rerank_degraded;
        let result = SearchResult { hits, mode, degraded, reranked };

        if options.use_cache {
            if let Ok(serialized) = serde_json::to_string(&result) {
                self.cache.set(CacheClass::Search, &cache_key, &serialized).await;
            }
        }

        Ok(result)
    }
}

/// Drops hits whose text is a near-duplicate (Jaccard word overlap ≥ 0.75) of
/// one already kept, then applies a diminishing-returns penalty per repeat
/// document already selected. Scores stay comparable since the penalty
/// multiplies rather than re-ranks across ties.
fn suppress_near_duplicates_and_diversify(
    ranked: Vec<(Uuid, f32, HitSource)>,
    hit_by_doc: &HashMap<Uuid, VectorHit>,
) -> Vec<(Uuid, f32, HitSource)> {
    let mut kept: Vec<(Uuid, f32, HitSource)> = Vec::with_capacity(ranked.len());
    let mut kept_word_sets: Vec<std::collections::HashSet<String>> = Vec::new();
    let mut doc_repeat_count: HashMap<Uuid, u32> = HashMap::new();

    for (document_id, score, source) in ranked {
        let words = hit_by_doc
            .get(&document_id)
            .map(|h| word_set(&h.text))
            .unwrap_or_default();

        let is_duplicate = kept_word_sets.iter().any(|seen| jaccard(seen, &words) >= NEAR_DUPLICATE_THRESHOLD);
        if is_duplicate {
            continue;
        }

        let repeats = *doc_repeat_count.get(&document_id).unwrap_or(&0);
        let penalized = score * DIVERSITY_LAMBDA.powi(repeats as i32);
        doc_repeat_count.insert(document_id, repeats + 1);

        kept_word_sets.push(words);
        kept.push((document_id, penalized, source));
    }

    kept.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    kept
}

fn word_set(text: &str) -> std::collections::HashSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

fn jaccard(a: &std::collections::HashSet<String>, b: &std::collections::HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::config::{CacheConfig, SearchConfig, StoreConfig};
    use crate::types::{Chunk, Document, DocumentType};

    fn hit(text: &str) -> VectorHit {
        VectorHit {
            id: "c1".to_string(),
            document_id: "d1".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            title: "t".to_string(),
            namespace: String::new(),
            source_ref: String::new(),
            score: 1.0,
        }
    }

    #[test]
    fn near_duplicate_text_is_suppressed() {
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        let mut by_doc = HashMap::new();
        by_doc.insert(id_a, hit("the quick brown fox jumps over the lazy dog"));
        by_doc.insert(id_b, hit("the quick brown fox jumps over the lazy cat"));

        let ranked = vec![(id_a, 1.0, HitSource::Both), (id_b, 0.9, HitSource::Both)];
        let kept = suppress_near_duplicates_and_diversify(ranked, &by_doc);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, id_a);
    }

    #[test]
    fn distinct_documents_both_survive() {
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        let mut by_doc = HashMap::new();
        by_doc.insert(id_a, hit("rust ownership and borrowing"));
        by_doc.insert(id_b, hit("python generators and coroutines"));

        let ranked = vec![(id_a, 1.0, HitSource::Both), (id_b, 0.9, HitSource::Both)];
        let kept = suppress_near_duplicates_and_diversify(ranked, &by_doc);
        assert_eq!(kept.len(), 2);
    }

    struct FixedQueryEmbedder {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingGateway for FixedQueryEmbedder {
        async fn embed(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
        fn dimension(&self) -> usize {
            self.vector.len()
        }
        fn model_id(&self) -> &str {
            "fixed-query-embedder"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingGateway for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
            Err(crate::error::EngineError::EmbedderUnavailable("embedder offline".to_string()))
        }
        fn dimension(&self) -> usize {
            4
        }
        fn model_id(&self) -> &str {
            "failing-embedder"
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl RerankerGateway for FailingReranker {
        async fn rerank(&self, _query: &str, _passages: &[String]) -> EngineResult<Vec<f32>> {
            Err(crate::error::EngineError::RerankerUnavailable("reranker offline".to_string()))
        }
    }

    async fn test_store(dim: usize) -> (Arc<Store>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store_config = StoreConfig {
            database_url: String::new(),
            db_pool_min: 2,
            db_pool_max: 10,
            db_pool_timeout_secs: 30,
            db_command_timeout_secs: 30,
            db_retry_attempts: 1,
        };
        let store = Arc::new(Store::open(dir.path(), dim, &store_config).await.unwrap());
        (store, dir)
    }

    async fn test_cache() -> Arc<Cache> {
        Arc::new(
            Cache::new(CacheConfig {
                cache_url: None,
                search_ttl_secs: 60,
                embedding_ttl_secs: 60,
                rerank_ttl_secs: 60,
            })
            .await,
        )
    }

    fn test_search_config() -> SearchConfig {
        SearchConfig {
            bm25_weight: 0.5,
            vector_weight: 0.5,
            rrf_k: 60,
            bm25_candidates: 20,
            vector_candidates: 20,
            search_default_limit: 10,
            search_max_limit: 50,
            quality_boost_alpha: 0.05,
        }
    }

    /// Writes a document with one chunk carrying `embedding`, bypassing the
    /// Ingestor entirely (mirroring how the chunk/document fixtures are
    /// wired up in `ingestor.rs`'s own test harness).
    async fn seed(store: &Store, title: &str, summary: &str, embedding: Vec<f32>) -> Uuid {
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            filepath: format!("notes/{title}.md"),
            content_hash: format!("hash-{title}"),
            doc_type: DocumentType::Note,
            url: None,
            title: title.to_string(),
            summary: Some(summary.to_string()),
            auto_tags: HashSet::new(),
            tags: HashSet::new(),
            metadata: HashMap::new(),
            namespace: None,
            quality_score: 0,
            created_at: now,
            updated_at: now,
            captured_at: now,
            deleted_at: None,
        };
        let (document_id, _) = store.upsert_document(document.clone()).unwrap();
        let mut document = document;
        document.id = document_id;

        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id,
            chunk_index: 0,
            text: format!("{title} representative chunk text"),
            embedding: Some(embedding),
            embedding_model: Some("test-embedder".to_string()),
            source_ref: None,
            start_char: None,
            end_char: None,
        };
        store.replace_chunks(&document, vec![chunk]).await.unwrap();
        document_id
    }

    /// Reproduces the RRF worked example: A at lexical rank 1 / vector rank
    /// 5 and B at lexical rank 3 / vector rank 2 fuse (with `w=1`, `k=60`) to
    /// score(A) = 1/61 + 1/65 ≈ 0.03178 and score(B) = 1/63 + 1/62 ≈ 0.03200,
    /// so B outranks A despite A's better lexical placement.
    #[tokio::test]
    async fn hybrid_search_orders_hits_by_fused_rrf_score() {
        let (store, _dir) = test_store(4).await;

        let term = "zzzqueryterm";
        let a_id = seed(&store, "DocA", &format!("{term} {term} {term} {term} {term} {term} {term} {term} filler filler"), vec![1.0, 0.20, 0.0, 0.0]).await;
        let _x_id = seed(
            &store,
            "DocX",
            &format!("{term} {term} {term} {term} filler filler filler filler filler filler"),
            vec![-1.0, 0.0, 0.0, 0.0],
        )
        .await;
        let b_id = seed(
            &store,
            "DocB",
            &format!("{term} filler filler filler filler filler filler filler filler filler"),
            vec![1.0, 0.05, 0.0, 0.0],
        )
        .await;
        let _y_id = seed(&store, "DocY", "filler filler filler filler filler filler filler filler filler filler", vec![1.0, 0.01, 0.0, 0.0]).await;
        let _z_id = seed(&store, "DocZ", "filler filler filler filler filler filler filler filler filler filler", vec![1.0, 0.10, 0.0, 0.0]).await;
        let _w_id = seed(&store, "DocW", "filler filler filler filler filler filler filler filler filler filler", vec![1.0, 0.15, 0.0, 0.0]).await;

        let embedder: Arc<dyn EmbeddingGateway> = Arc::new(FixedQueryEmbedder { vector: vec![1.0, 0.0, 0.0, 0.0] });
        let engine = SearchEngine::new(store, embedder, None, test_cache().await, &test_search_config(), 5);
        engine.update_weights(SearchWeights {
            bm25_weight: 1.0,
            vector_weight: 1.0,
            rrf_k: 60,
            quality_boost_alpha: 0.0,
        });

        let options = SearchOptions { limit: 2, ..SearchOptions::default() };
        let result = engine.hybrid_search(term, &options).await.unwrap();

        assert_eq!(result.mode, SearchMode::Full);
        assert!(!result.degraded);
        assert_eq!(result.hits.len(), 2);
        assert_eq!(result.hits[0].document_id, b_id);
        assert_eq!(result.hits[1].document_id, a_id);
    }

    /// P6: with the reranker absent, requesting `rerank=true` must return
    /// the exact same item order as `rerank=false`, just flagged degraded.
    #[tokio::test]
    async fn hybrid_search_preserves_fused_order_when_reranker_is_absent() {
        let (store, _dir) = test_store(4).await;

        let term = "zzzqueryterm";
        seed(&store, "DocA", &format!("{term} {term} {term} {term} {term} filler filler filler filler filler"), vec![1.0, 0.01, 0.0, 0.0]).await;
        seed(&store, "DocC", &format!("{term} {term} {term} filler filler filler filler filler filler filler"), vec![1.0, 0.10, 0.0, 0.0]).await;
        seed(&store, "DocB", &format!("{term} filler filler filler filler filler filler filler filler filler"), vec![1.0, 0.20, 0.0, 0.0]).await;

        let embedder: Arc<dyn EmbeddingGateway> = Arc::new(FixedQueryEmbedder { vector: vec![1.0, 0.0, 0.0, 0.0] });
        let engine = SearchEngine::new(store, embedder, None, test_cache().await, &test_search_config(), 5);

        let baseline_options = SearchOptions { rerank: false, use_cache: false, ..SearchOptions::default() };
        let baseline = engine.hybrid_search(term, &baseline_options).await.unwrap();
        assert!(!baseline.degraded);
        assert!(!baseline.reranked);

        let rerank_requested_options = SearchOptions { rerank: true, use_cache: false, ..SearchOptions::default() };
        let degraded_result = engine.hybrid_search(term, &rerank_requested_options).await.unwrap();

        assert!(degraded_result.degraded);
        assert!(!degraded_result.reranked);
        let baseline_ids: Vec<_> = baseline.hits.iter().map(|h| h.document_id).collect();
        let degraded_ids: Vec<_> = degraded_result.hits.iter().map(|h| h.document_id).collect();
        assert_eq!(baseline_ids, degraded_ids);
    }

    /// P6, reranker present but failing: the engine must degrade to the
    /// pre-rerank fused order rather than propagate the reranker's error.
    #[tokio::test]
    async fn hybrid_search_degrades_to_fused_order_when_reranker_call_fails() {
        let (store, _dir) = test_store(4).await;

        let term = "zzzqueryterm";
        seed(&store, "DocA", &format!("{term} {term} {term} filler filler"), vec![1.0, 0.1, 0.0, 0.0]).await;
        seed(&store, "DocB", &format!("{term} filler filler filler filler"), vec![1.0, 0.2, 0.0, 0.0]).await;

        let embedder: Arc<dyn EmbeddingGateway> = Arc::new(FixedQueryEmbedder { vector: vec![1.0, 0.0, 0.0, 0.0] });
        let reranker: Arc<dyn RerankerGateway> = Arc::new(FailingReranker);
        let engine = SearchEngine::new(store, embedder, Some(reranker), test_cache().await, &test_search_config(), 5);

        let options = SearchOptions { rerank: true, use_cache: false, ..SearchOptions::default() };
        let result = engine.hybrid_search(term, &options).await.unwrap();

        assert!(result.degraded);
        assert!(!result.reranked);
        assert_eq!(result.hits.len(), 2);
    }

    /// S4/P7: an unavailable embedder must not fail the search outright —
    /// it degrades to the lexical top-N with `search_mode=lexical_only`.
    #[tokio::test]
    async fn hybrid_search_falls_back_to_lexical_only_when_embedder_is_unavailable() {
        let (store, _dir) = test_store(4).await;

        let term = "zzzqueryterm";
        let a_id = seed(&store, "DocA", &format!("{term} {term} {term} filler filler"), vec![1.0, 0.1, 0.0, 0.0]).await;
        let b_id = seed(&store, "DocB", &format!("{term} filler filler filler filler"), vec![1.0, 0.2, 0.0, 0.0]).await;

        let embedder: Arc<dyn EmbeddingGateway> = Arc::new(FailingEmbedder);
        let engine = SearchEngine::new(store, embedder, None, test_cache().await, &test_search_config(), 5);

        let options = SearchOptions { use_cache: false, ..SearchOptions::default() };
        let result = engine.hybrid_search(term, &options).await.unwrap();

        assert_eq!(result.mode, SearchMode::LexicalOnly);
        assert!(result.degraded);
        assert_eq!(result.hits.len(), 2);
        assert_eq!(result.hits[0].document_id, a_id);
        assert_eq!(result.hits[1].document_id, b_id);
    }
}
