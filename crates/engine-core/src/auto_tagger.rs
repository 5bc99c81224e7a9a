use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::llm::TieredLlmGateway;
use crate::store::Store;

const MAX_TAGS: usize = 8;
const TAG_GENERATION_TIMEOUT: Duration = Duration::from_secs(20);
const CONTEXT_CHUNK_COUNT: usize = 3;

/// Asynchronous post-ingest tag extraction: prompts the LLM gateway
/// for a short tag list from title+summary+first chunks and stores it into
/// `auto_tags`. Entirely non-fatal — a failed or unparseable generation just
/// leaves `auto_tags` as it was. The LLM call runs under a bounded timeout,
/// and the response parser degrades all the way down to "do nothing" rather
/// than propagating a parse failure to the ingest path.
pub struct AutoTagger {
    store: Arc<Store>,
    llm: Arc<TieredLlmGateway>,
}

impl AutoTagger {
    pub fn new(store: Arc<Store>, llm: Arc<TieredLlmGateway>) -> Self {
        Self { store, llm }
    }

    /// Fires a detached background task; ingest never waits on tagging.
    pub fn enqueue(self: &Arc<Self>, document_id: Uuid) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.run(document_id).await {
                tracing::warn!(document_id = %document_id, error = %e, "auto-tagging failed, leaving auto_tags unchanged");
            }
        });
    }

    async fn run(&self, document_id: Uuid) -> anyhow::Result<()> {
        let Some(document) = self.store.get_document(document_id) else {
            return Ok(());
        };

        let chunks = self.store.chunks_for_document(document_id, CONTEXT_CHUNK_COUNT).await.unwrap_or_default();
        let context: String = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");

        let prompt = build_tag_prompt(&document.title, document.summary.as_deref(), &context);

        let (raw_output, _usage) = tokio::time::timeout(TAG_GENERATION_TIMEOUT, self.llm.generate(&prompt))
            .await
            .map_err(|_| anyhow::anyhow!("auto-tagger LLM call timed out"))??;

        let Some(tags) = parse_tags(&raw_output) else {
            tracing::debug!(document_id = %document_id, output = %raw_output.chars().take(200).collect::<String>(), "could not parse auto-tagger output");
            return Ok(());
        };
        if tags.is_empty() {
            return Ok(());
        }

        self.store.augment_auto_tags(document_id, tags, None)?;
        Ok(())
    }
}

fn build_tag_prompt(title: &str, summary: Option<&str>, context: &str) -> String {
    let summary_line = summary.map(|s| format!("Summary: {s}\n")).unwrap_or_default();
    format!(
        "Suggest up to {MAX_TAGS} short topical tags for this document. \
         Return ONLY a JSON array of lowercase tag strings, nothing else.\n\n\
         Title: {title}\n{summary_line}Content:\n{context}\n\nTags:",
    )
}

/// Three-tier tolerant parse, mirroring `llm_reranker::parse_ranking`:
/// direct JSON array, the first `[...]` substring, or give up entirely.
fn parse_tags(output: &str) -> Option<HashSet<String>> {
    let trimmed = output
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(tags) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Some(normalize(tags));
    }

    if let Some(start) = trimmed.find('[') {
        if let Some(end) = trimmed[start..].find(']') {
            let slice = &trimmed[start..=start + end];
            if let Ok(tags) = serde_json::from_str::<Vec<String>>(slice) {
                return Some(normalize(tags));
            }
        }
    }

    None
}

fn normalize(tags: Vec<String>) -> HashSet<String> {
    tags.into_iter()
        .map(|t| t.trim().trim_matches('"').to_lowercase())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_clean_json_array() {
        let tags = parse_tags(r#"["rust", "async", "ownership"]"#).unwrap();
        assert_eq!(tags.len(), 3);
        assert!(tags.contains("rust"));
    }

    #[test]
    fn parses_an_array_wrapped_in_a_markdown_code_fence() {
        let tags = parse_tags("```json\n[\"rust\", \"cli\"]\n```").unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn extracts_the_first_array_from_surrounding_prose() {
        let tags = parse_tags("Here are the tags: [\"rust\", \"fsrs\"] - hope that helps!").unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn unparseable_output_returns_none() {
        assert!(parse_tags("I cannot help with that.").is_none());
    }

    #[test]
    fn tag_count_is_capped_and_lowercased() {
        let many: Vec<String> = (0..20).map(|i| format!("TAG{i}")).collect();
        let tags = parse_tags(&serde_json::to_string(&many).unwrap()).unwrap();
        assert_eq!(tags.len(), MAX_TAGS);
        assert!(tags.iter().all(|t| t.chars().all(|c| !c.is_uppercase())));
    }
}
