use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbedderConfig;
use crate::error::{EngineError, EngineResult};

/// Contract to an external text→vector function. Implementations must
/// preserve input order and report a stable `model_id` to be recorded with
/// each chunk.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    async fn embed(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
    fn model_id(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP-backed embedder gateway. Batches requests at `embedding_batch_size`
/// and retries each batch with exponential backoff before raising
/// `EmbedderUnavailable`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    max_retries: u32,
}

impl HttpEmbedder {
    pub fn new(config: &EmbedderConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.embedding_timeout_secs))
            .build()
            .expect("embedder http client");

        Self {
            client,
            url: config.embedder_url.clone(),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dim,
            batch_size: config.embedding_batch_size,
            max_retries: config.embedder_max_retries,
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        let mut delay = Duration::from_millis(500);
        let mut last_err = String::new();

        for attempt in 0..self.max_retries.max(1) {
            let result = self
                .client
                .post(&self.url)
                .json(&EmbedRequest {
                    model: &self.model,
                    input: batch,
                })
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    if !status.is_success() {
                        let preview: String = body.chars().take(200).collect();
                        last_err = format!("embedder returned {status}: {preview}");
                    } else if body.trim_start().starts_with('<') {
                        last_err = "embedder returned HTML, not JSON".to_string();
                    } else {
                        match serde_json::from_str::<EmbedResponse>(&body) {
                            Ok(parsed) => return Ok(parsed.embeddings),
                            Err(e) => last_err = format!("failed to parse embedder response: {e}"),
                        }
                    }
                }
                Err(e) => last_err = e.to_string(),
            }

            if attempt + 1 < self.max_retries.max(1) {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(EngineError::EmbedderUnavailable(last_err))
    }
}

#[async_trait]
impl EmbeddingGateway for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let vectors = self.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(EngineError::EmbedderUnavailable(
                    "embedder returned a different number of vectors than inputs".to_string(),
                ));
            }
            out.extend(vectors);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
