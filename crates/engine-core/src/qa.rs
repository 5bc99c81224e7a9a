use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::llm::{build_qa_prompt, TieredLlmGateway};
use crate::search::{SearchEngine, SearchHit, SearchOptions};

/// Question-answering layer over the search engine: retrieves, scores
/// confidence from the retrieval signal alone, and only calls the LLM when
/// there is enough evidence to ground an answer in.
pub struct QaEngine {
    search: Arc<SearchEngine>,
    llm: Arc<TieredLlmGateway>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub marker: usize,
    pub document_id: Uuid,
    pub title: String,
    pub chunk_text: String,
    pub source_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaResult {
    pub answer: String,
    pub confidence: Confidence,
    pub citations: Vec<Citation>,
    pub sources: Vec<SearchHit>,
}

const NO_EVIDENCE_REPLY: &str =
    "I don't have enough indexed material to answer this confidently. Try rephrasing the question or ingesting more sources on this topic.";

static CITATION_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("citation marker regex is valid"));

impl QaEngine {
    pub fn new(search: Arc<SearchEngine>, llm: Arc<TieredLlmGateway>) -> Self {
        Self { search, llm }
    }

    /// Retrieve (limit=10, rerank=true) → empty-evidence short-circuit →
    /// confidence scoring → low-confidence templated reply with no LLM call
    /// → numbered context + generation → citation binding.
    pub async fn ask(&self, question: &str) -> EngineResult<QaResult> {
        let options = SearchOptions {
            limit: 10,
            rerank: true,
            ..SearchOptions::default()
        };
        let result = self.search.hybrid_search(question, &options).await?;

        if result.hits.is_empty() {
            return Ok(QaResult {
                answer: NO_EVIDENCE_REPLY.to_string(),
                confidence: Confidence::Low,
                citations: Vec::new(),
                sources: Vec::new(),
            });
        }

        let confidence = classify(confidence_score(&result.hits));

        if confidence == Confidence::Low {
            return Ok(QaResult {
                answer: NO_EVIDENCE_REPLY.to_string(),
                confidence,
                citations: Vec::new(),
                sources: result.hits,
            });
        }

        let context: Vec<&SearchHit> = result.hits.iter().take(5).collect();
        let numbered_context: Vec<(usize, String, String)> =
            context.iter().enumerate().map(|(i, hit)| (i + 1, hit.title.clone(), hit.text.clone())).collect();
        let prompt = build_qa_prompt(question, &numbered_context);

        let (answer, _usage) = self.llm.generate(&prompt).await?;
        let citations = extract_citations(&answer, &context);

        Ok(QaResult {
            answer,
            confidence,
            citations,
            sources: result.hits,
        })
    }
}

/// `0.6·top + 0.4·avg3` over the hits' final (rerank-or-fused) scores.
fn confidence_score(hits: &[SearchHit]) -> f32 {
    let top = hits[0].score;
    let take = hits.len().min(3);
    let avg3 = hits[..take].iter().map(|h| h.score).sum::<f32>() / take as f32;
    0.6 * top + 0.4 * avg3
}

fn classify(score: f32) -> Confidence {
    if score < 0.3 {
        Confidence::Low
    } else if score < 0.7 {
        Confidence::Medium
    } else {
        Confidence::High
    }
}

/// Binds every `[n]` marker in the answer to its numbered context record;
/// out-of-range or repeated markers are dropped rather than fabricated.
fn extract_citations(answer: &str, context: &[&SearchHit]) -> Vec<Citation> {
    let mut seen = std::collections::HashSet::new();
    let mut citations = Vec::new();

    for cap in CITATION_MARKER_RE.captures_iter(answer) {
        let Some(marker) = cap.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
            continue;
        };
        if marker == 0 || marker > context.len() || !seen.insert(marker) {
            continue;
        }
        let hit = context[marker - 1];
        citations.push(Citation {
            marker,
            document_id: hit.document_id,
            title: hit.title.clone(),
            chunk_text: hit.text.clone(),
            source_ref: hit.source_ref.clone(),
        });
    }

    citations.sort_by_key(|c| c.marker);
    citations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::HitSource;

    fn hit(score: f32, title: &str) -> SearchHit {
        SearchHit {
            document_id: Uuid::new_v4(),
            chunk_id: None,
            chunk_index: None,
            title: title.to_string(),
            text: "text".to_string(),
            source_ref: None,
            score,
            source: HitSource::Both,
        }
    }

    #[test]
    fn high_top_score_with_weak_supporting_hits_classifies_as_medium() {
        let hits = vec![hit(0.95, "a"), hit(0.1, "b"), hit(0.1, "c")];
        let score = confidence_score(&hits);
        assert_eq!(classify(score), Confidence::Medium);
    }

    #[test]
    fn uniformly_strong_hits_classify_as_high() {
        let hits = vec![hit(0.9, "a"), hit(0.85, "b"), hit(0.8, "c")];
        assert_eq!(classify(confidence_score(&hits)), Confidence::High);
    }

    #[test]
    fn extract_citations_ignores_out_of_range_and_duplicate_markers() {
        let a = hit(0.9, "Rust Book");
        let b = hit(0.8, "Ownership Guide");
        let context = vec![&a, &b];

        let citations = extract_citations("Ownership is explained in [1] and again in [1], see also [9].", &context);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].marker, 1);
        assert_eq!(citations[0].title, "Rust Book");
    }
}
