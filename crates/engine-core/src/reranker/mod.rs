use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;
use crate::error::{EngineError, EngineResult};

const MAX_BATCH: usize = 16;

/// Contract to an external cross-encoder: one score per passage, in
/// input order, not necessarily normalized. Unavailability is non-fatal to
/// the caller — the Search engine degrades to the pre-rerank ranking.
#[async_trait]
pub trait RerankerGateway: Send + Sync {
    async fn rerank(&self, query: &str, passages: &[String]) -> EngineResult<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    passages: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

pub struct HttpReranker {
    client: reqwest::Client,
    url: String,
}

impl HttpReranker {
    pub fn new(config: &RerankerConfig) -> Option<Self> {
        let url = config.reranker_url.clone()?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reranker http client");
        Some(Self { client, url })
    }

    async fn rerank_batch(&self, query: &str, batch: &[String]) -> EngineResult<Vec<f32>> {
        let resp = self
            .client
            .post(&self.url)
            .json(&RerankRequest { query, passages: batch })
            .send()
            .await
            .map_err(|e| EngineError::RerankerUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EngineError::RerankerUnavailable(format!("status {}", resp.status())));
        }

        let body: RerankResponse = resp
            .json()
            .await
            .map_err(|e| EngineError::RerankerUnavailable(e.to_string()))?;

        if body.scores.len() != batch.len() {
            return Err(EngineError::RerankerUnavailable(
                "reranker returned a different number of scores than passages".to_string(),
            ));
        }
        Ok(body.scores)
    }
}

#[async_trait]
impl RerankerGateway for HttpReranker {
    async fn rerank(&self, query: &str, passages: &[String]) -> EngineResult<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let mut scores = Vec::with_capacity(passages.len());
        for batch in passages.chunks(MAX_BATCH) {
            scores.extend(self.rerank_batch(query, batch).await?);
        }
        Ok(scores)
    }
}
