use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{LlmProvider, ProviderKind, TokenUsage};
use crate::error::{EngineError, EngineResult};

/// External API provider. Mirrors the request/response shapes of the
/// three external families the gateway supports; `Custom` endpoints are
/// assumed OpenAI-compatible.
pub struct HttpLlmProvider {
    kind: ProviderKind,
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl HttpLlmProvider {
    pub fn new(kind: ProviderKind, endpoint: Option<String>, api_key: String, model: String) -> Self {
        let endpoint = endpoint.unwrap_or_else(|| default_endpoint(&kind));
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("llm http client");

        Self {
            kind,
            endpoint,
            api_key,
            model,
            client,
        }
    }

    async fn parse_json_response<T: serde::de::DeserializeOwned>(response: reqwest::Response, endpoint: &str) -> EngineResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::LlmUnavailable(format!("failed to read response body from {endpoint}: {e}")))?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(EngineError::LlmUnavailable(format!(
                "{endpoint} returned HTML instead of JSON (HTTP {status}): {preview}"
            )));
        }

        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(EngineError::LlmUnavailable(format!("{endpoint} returned {status}: {preview}")));
        }

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            EngineError::LlmUnavailable(format!("failed to parse response from {endpoint}: {e}. body: {preview}"))
        })
    }

    async fn openai_compatible_generate(&self, prompt: &str) -> EngineResult<(String, TokenUsage)> {
        let request = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::LlmUnavailable(format!("request to {} failed: {e}", self.endpoint)))?;

        let parsed: OpenAiResponse = Self::parse_json_response(response, &self.endpoint).await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::LlmUnavailable("provider returned no choices".to_string()))?;

        let usage = TokenUsage {
            prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or_default(),
            completion_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens).unwrap_or_default(),
        };
        Ok((choice.message.content, usage))
    }

    async fn anthropic_generate(&self, prompt: &str) -> EngineResult<(String, TokenUsage)> {
        let request = json!({
            "model": self.model,
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::LlmUnavailable(format!("request to {} failed: {e}", self.endpoint)))?;

        let parsed: AnthropicResponse = Self::parse_json_response(response, &self.endpoint).await?;
        let text = parsed
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| EngineError::LlmUnavailable("provider returned empty content".to_string()))?;

        let usage = TokenUsage {
            prompt_tokens: parsed.usage.as_ref().map(|u| u.input_tokens).unwrap_or_default(),
            completion_tokens: parsed.usage.as_ref().map(|u| u.output_tokens).unwrap_or_default(),
        };
        Ok((text, usage))
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn generate(&self, prompt: &str, timeout: Duration) -> EngineResult<(String, TokenUsage)> {
        let call = match self.kind {
            ProviderKind::Anthropic => self.anthropic_generate(prompt),
            ProviderKind::OpenAi | ProviderKind::Custom => self.openai_compatible_generate(prompt),
        };

        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| EngineError::LlmUnavailable(format!("{} timed out after {:?}", self.endpoint, timeout)))?
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn default_endpoint(kind: &ProviderKind) -> String {
    match kind {
        ProviderKind::OpenAi => "https://api.openai.com/v1/chat/completions".to_string(),
        ProviderKind::Anthropic => "https://api.anthropic.com/v1/messages".to_string(),
        ProviderKind::Custom => "http://localhost:11434/v1/chat/completions".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}
