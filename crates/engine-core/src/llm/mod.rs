mod external;

pub use external::HttpLlmProvider;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// One named external API shape. `Custom` is assumed OpenAI-compatible,
/// the common default for unrecognized endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Custom,
}

impl ProviderKind {
    /// Parses a `llm_providers` config entry of the form `kind:model` (e.g.
    /// `openai:gpt-4o-mini`, `anthropic:claude-3-5-sonnet`).
    pub fn parse(spec: &str) -> (Self, String) {
        match spec.split_once(':') {
            Some(("openai", model)) => (Self::OpenAi, model.to_string()),
            Some(("anthropic", model)) => (Self::Anthropic, model.to_string()),
            Some((_, model)) => (Self::Custom, model.to_string()),
            None => (Self::Custom, spec.to_string()),
        }
    }
}

/// Capability shared by every LLM tier: take a fully-assembled prompt,
/// return generated text plus usage accounting.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str, timeout: Duration) -> EngineResult<(String, TokenUsage)>;
    fn name(&self) -> &str;
}

/// Tiered fallback gateway: tries providers in configured order,
/// escalating to the next tier on a transient failure and surfacing
/// `LlmUnavailable` only once every tier has failed.
pub struct TieredLlmGateway {
    providers: Vec<Box<dyn LlmProvider>>,
    timeout: Duration,
}

impl TieredLlmGateway {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>, timeout_secs: u64) -> Self {
        Self {
            providers,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn generate(&self, prompt: &str) -> EngineResult<(String, TokenUsage)> {
        if self.providers.is_empty() {
            return Err(EngineError::LlmUnavailable("no LLM providers configured".to_string()));
        }

        let mut last_err = String::new();
        for provider in &self.providers {
            match provider.generate(prompt, self.timeout).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "LLM tier failed, escalating");
                    last_err = e.to_string();
                    if !e.is_transient() {
                        return Err(EngineError::LlmUnavailable(last_err));
                    }
                }
            }
        }

        Err(EngineError::LlmUnavailable(last_err))
    }
}

/// System instructions plus a numbered source list: every claim in the
/// answer is expected to cite a `[n]` back to one of these sources.
pub fn build_qa_prompt(question: &str, numbered_context: &[(usize, String, String)]) -> String {
    let mut prompt = String::from(
        "You are a careful research assistant. Answer the question using only the numbered \
         sources below. Cite sources inline as [n] for every claim. If the sources do not \
         contain enough information, say so plainly.\n\n",
    );

    for (index, title, text) in numbered_context {
        prompt.push_str(&format!("[{index}] ({title}) {text}\n\n"));
    }

    prompt.push_str(&format!("Question: {question}\nAnswer:"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_provider_kinds() {
        assert_eq!(ProviderKind::parse("openai:gpt-4o-mini"), (ProviderKind::OpenAi, "gpt-4o-mini".to_string()));
        assert_eq!(
            ProviderKind::parse("anthropic:claude-3-5-sonnet"),
            (ProviderKind::Anthropic, "claude-3-5-sonnet".to_string())
        );
        assert_eq!(ProviderKind::parse("ollama:llama3"), (ProviderKind::Custom, "llama3".to_string()));
        assert_eq!(ProviderKind::parse("bare-model"), (ProviderKind::Custom, "bare-model".to_string()));
    }

    #[tokio::test]
    async fn empty_provider_list_raises_llm_unavailable() {
        let gateway = TieredLlmGateway::new(Vec::new(), 30);
        let err = gateway.generate("hello").await.unwrap_err();
        assert!(matches!(err, EngineError::LlmUnavailable(_)));
    }

    #[test]
    fn build_qa_prompt_cites_sources_by_index() {
        let prompt = build_qa_prompt("what is rust?", &[(1, "Rust Book".to_string(), "a systems language".to_string())]);
        assert!(prompt.contains("[1] (Rust Book)"));
        assert!(prompt.contains("Question: what is rust?"));
    }
}
