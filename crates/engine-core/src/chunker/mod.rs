use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{Chunk, Document, MAX_CHUNK_CHARS};

/// Approximate tokens-per-character ratio used when no tokenizer is
/// available.
const CHARS_PER_TOKEN: usize = 4;

/// One caption segment of a YouTube transcript.
#[derive(Debug, Clone)]
pub struct CaptionSegment {
    pub start_secs: f64,
    pub text: String,
}

/// Raw content handed to the chunker, tagged by the shape the caller already
/// has on hand (not necessarily `document.doc_type` — a `File` document
/// might be a PDF with per-page text, or plain text).
pub enum ChunkSource<'a> {
    Youtube { full_text: &'a str, segments: Option<&'a [CaptionSegment]> },
    Bookmark(&'a str),
    Pdf { pages: &'a [String] },
    Generic(&'a str),
}

/// A chunk before embedding. The text actually sent to the embedder is
/// derived separately via `Chunker::embed_text`, optionally contextualized.
pub struct ChunkDraft {
    pub text: String,
    pub source_ref: Option<String>,
    pub start_char: Option<u32>,
    pub end_char: Option<u32>,
}

/// Content-type-dispatched splitter. Deterministic: same input always
/// produces the same ordered chunk list. Every text-bearing strategy below
/// shares one boundary-snapping primitive: prefer a paragraph break, then a
/// sentence break, then a line break, then a word break, falling back to a
/// raw UTF-8-safe character cut only when none exists within range.
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, document: &Document, source: ChunkSource) -> EngineResult<Vec<Chunk>> {
        let drafts = match source {
            ChunkSource::Youtube { segments: Some(segments), .. } if !segments.is_empty() => {
                self.chunk_youtube_segments(segments)
            }
            ChunkSource::Youtube { full_text, .. } => self.recursive_split(
                full_text,
                self.config.note_target_tokens * CHARS_PER_TOKEN,
                (self.config.note_target_tokens as f32 * self.config.note_overlap_ratio) as usize * CHARS_PER_TOKEN,
            ),
            ChunkSource::Bookmark(text) => self.chunk_paragraphs(
                text,
                self.config.bookmark_target_tokens * CHARS_PER_TOKEN,
                (self.config.bookmark_target_tokens as f32 * self.config.bookmark_overlap_ratio) as usize * CHARS_PER_TOKEN,
            ),
            ChunkSource::Pdf { pages } => self.chunk_pdf_pages(pages),
            ChunkSource::Generic(text) => self.recursive_split(
                text,
                self.config.note_target_tokens * CHARS_PER_TOKEN,
                (self.config.note_target_tokens as f32 * self.config.note_overlap_ratio) as usize * CHARS_PER_TOKEN,
            ),
        };

        let drafts = self.resplit_oversized(drafts);
        let drafts: Vec<ChunkDraft> = drafts.into_iter().filter(|d| !d.text.trim().is_empty()).collect();

        if let Some(oversized) = drafts.iter().find(|d| d.text.len() > MAX_CHUNK_CHARS) {
            return Err(EngineError::ChunkingError {
                document_id: document.id,
                reason: format!("chunk of {} chars still exceeds the {MAX_CHUNK_CHARS}-char limit after re-splitting", oversized.text.len()),
            });
        }

        let chunks = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| Chunk {
                id: Uuid::new_v4(),
                document_id: document.id,
                chunk_index: index as u32,
                text: draft.text,
                embedding: None,
                embedding_model: None,
                source_ref: draft.source_ref,
                start_char: draft.start_char,
                end_char: draft.end_char,
            })
            .collect();

        Ok(chunks)
    }

    /// Returns the text that should actually be sent to the embedder for a
    /// chunk, optionally prefixed with document-level context.
    pub fn embed_text(&self, document: &Document, chunk: &Chunk) -> String {
        if !self.config.contextualize {
            return chunk.text.clone();
        }
        let section = chunk.source_ref.as_deref().unwrap_or("body");
        let source = document.url.as_deref().unwrap_or(document.filepath.as_str());
        format!("Document: \"{}\". Source: {}. Section: {}. {}", document.title, source, section, chunk.text)
    }

    /// Groups caption segments into ~`youtube_window_secs` windows, emitting
    /// `timestamp:M:SS` at the window start.
    fn chunk_youtube_segments(&self, segments: &[CaptionSegment]) -> Vec<ChunkDraft> {
        let window = self.config.youtube_window_secs as f64;
        let mut drafts = Vec::new();
        let mut window_start_secs = segments[0].start_secs;
        let mut buf = String::new();

        for (i, seg) in segments.iter().enumerate() {
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(seg.text.trim());

            let elapsed = seg.start_secs - window_start_secs;
            let next_start = segments.get(i + 1).map(|s| s.start_secs);
            let ends_window = elapsed >= window || next_start.is_none();
            let ends_sentence = buf.trim_end().ends_with(['.', '!', '?']);

            if ends_window && (ends_sentence || next_start.is_none()) {
                drafts.push(ChunkDraft {
                    text: buf.trim().to_string(),
                    source_ref: Some(format_timestamp(window_start_secs)),
                    start_char: None,
                    end_char: None,
                });
                buf = String::new();
                if let Some(next) = next_start {
                    window_start_secs = next;
                }
            }
        }

        if !buf.trim().is_empty() {
            drafts.push(ChunkDraft {
                text: buf.trim().to_string(),
                source_ref: Some(format_timestamp(window_start_secs)),
                start_char: None,
                end_char: None,
            });
        }

        drafts
    }

    /// Packs whole paragraphs up to a token budget, repeating the trailing
    /// `overlap_chars` of one chunk at the start of the next.
    fn chunk_paragraphs(&self, text: &str, target_chars: usize, overlap_chars: usize) -> Vec<ChunkDraft> {
        let paragraphs: Vec<&str> = text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect();
        if paragraphs.is_empty() {
            return Vec::new();
        }

        let mut drafts = Vec::new();
        let mut current = String::new();
        let mut cursor = 0usize;
        let mut chunk_start_offset = 0usize;

        for paragraph in &paragraphs {
            if !current.is_empty() && current.len() + paragraph.len() + 2 > target_chars {
                drafts.push(ChunkDraft {
                    text: current.clone(),
                    source_ref: None,
                    start_char: Some(chunk_start_offset as u32),
                    end_char: Some((chunk_start_offset + current.len()) as u32),
                });

                let overlap_start = current.len().saturating_sub(overlap_chars);
                let overlap_start = snap_to_char_boundary(&current, overlap_start);
                current = current[overlap_start..].to_string();
                chunk_start_offset = cursor - current.len();
            }

            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
            cursor += paragraph.len() + 2;
        }

        if !current.trim().is_empty() {
            drafts.push(ChunkDraft {
                text: current.clone(),
                source_ref: None,
                start_char: Some(chunk_start_offset as u32),
                end_char: Some((chunk_start_offset + current.len()) as u32),
            });
        }

        drafts
    }

    /// Splits per page, falling back to a recursive split for pages over
    /// `pdf_page_token_limit` tokens.
    fn chunk_pdf_pages(&self, pages: &[String]) -> Vec<ChunkDraft> {
        let mut drafts = Vec::new();
        let limit_chars = self.config.pdf_page_token_limit * CHARS_PER_TOKEN;

        for (page_index, page_text) in pages.iter().enumerate() {
            let page_text = page_text.trim();
            if page_text.is_empty() {
                continue;
            }

            let page_no = page_index + 1;
            if page_text.len() <= limit_chars {
                drafts.push(ChunkDraft {
                    text: page_text.to_string(),
                    source_ref: Some(format!("page:{page_no}")),
                    start_char: None,
                    end_char: None,
                });
                continue;
            }

            let overlap_chars = (self.config.note_target_tokens as f32 * self.config.note_overlap_ratio) as usize * CHARS_PER_TOKEN;
            for mut sub in self.recursive_split(page_text, limit_chars, overlap_chars) {
                sub.source_ref = Some(format!("page:{page_no}"));
                drafts.push(sub);
            }
        }

        drafts
    }

    /// Recursive character splitter: sliding window that prefers, in order,
    /// a paragraph break, a sentence end, a line break, or a word break near
    /// the target boundary.
    fn recursive_split(&self, text: &str, target_chars: usize, overlap_chars: usize) -> Vec<ChunkDraft> {
        if text.len() <= target_chars {
            if text.trim().is_empty() {
                return Vec::new();
            }
            return vec![ChunkDraft {
                text: text.to_string(),
                source_ref: None,
                start_char: Some(0),
                end_char: Some(text.len() as u32),
            }];
        }

        let mut drafts = Vec::new();
        let mut start = 0usize;

        while start < text.len() {
            let raw_end = (start + target_chars).min(text.len());
            let end = snap_to_char_boundary(text, raw_end);
            let actual_end = if end < text.len() { find_break_point(text, start, end) } else { end };

            let chunk_text = text[start..actual_end].trim();
            if !chunk_text.is_empty() {
                drafts.push(ChunkDraft {
                    text: chunk_text.to_string(),
                    source_ref: None,
                    start_char: Some(start as u32),
                    end_char: Some(actual_end as u32),
                });
            }

            let step = if actual_end > start + overlap_chars { actual_end - start - overlap_chars } else { actual_end - start };
            let raw_next = start + step.max(1);
            start = snap_to_char_boundary(text, raw_next);
            if start >= text.len() {
                break;
            }
        }

        drafts
    }

    /// Re-splits any draft whose text still exceeds the store's 10,000-char
    /// limit after the primary strategy ran.
    fn resplit_oversized(&self, drafts: Vec<ChunkDraft>) -> Vec<ChunkDraft> {
        let mut out = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if draft.text.len() <= MAX_CHUNK_CHARS {
                out.push(draft);
                continue;
            }
            let source_ref = draft.source_ref.clone();
            for mut sub in self.recursive_split(&draft.text, MAX_CHUNK_CHARS, 0) {
                sub.source_ref = source_ref.clone();
                out.push(sub);
            }
        }
        out
    }
}

fn format_timestamp(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("timestamp:{}:{:02}", total / 60, total % 60)
}

fn snap_to_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

fn find_break_point(text: &str, start: usize, preferred_end: usize) -> usize {
    let raw_search_start = if preferred_end > 200 { preferred_end - 200 } else { start };
    let search_start = snap_to_char_boundary(text, raw_search_start);
    let safe_end = snap_to_char_boundary(text, preferred_end);

    if search_start >= safe_end {
        return safe_end;
    }

    let search_region = &text[search_start..safe_end];

    if let Some(pos) = search_region.rfind("\n\n") {
        return search_start + pos + 2;
    }
    if let Some(pos) = search_region.rfind(". ") {
        return search_start + pos + 2;
    }
    if let Some(pos) = search_region.rfind(".\n") {
        return search_start + pos + 2;
    }
    if let Some(pos) = search_region.rfind('\n') {
        return search_start + pos + 1;
    }
    if let Some(pos) = search_region.rfind(' ') {
        return search_start + pos + 1;
    }

    safe_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::{HashMap, HashSet};

    fn test_document() -> Document {
        Document {
            id: Uuid::new_v4(),
            filepath: "note.txt".to_string(),
            content_hash: "abc".to_string(),
            doc_type: crate::types::DocumentType::Note,
            url: None,
            title: "Test Note".to_string(),
            summary: None,
            auto_tags: HashSet::new(),
            tags: HashSet::new(),
            metadata: HashMap::new(),
            namespace: None,
            quality_score: 50,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            captured_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn test_config() -> ChunkingConfig {
        ChunkingConfig {
            youtube_window_secs: 180,
            bookmark_target_tokens: 20,
            bookmark_overlap_ratio: 0.15,
            pdf_page_token_limit: 20,
            note_target_tokens: 20,
            note_overlap_ratio: 0.15,
            contextualize: true,
        }
    }

    #[test]
    fn chunk_index_is_dense_and_zero_based() {
        let chunker = Chunker::new(test_config());
        let document = test_document();
        let long_text = "word ".repeat(200);
        let chunks = chunker.chunk(&document, ChunkSource::Generic(&long_text)).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
        }
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let chunker = Chunker::new(test_config());
        let document = test_document();
        let chunks = chunker.chunk(&document, ChunkSource::Generic("   \n\n  ")).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn oversized_chunk_is_resplit_under_the_store_limit() {
        let chunker = Chunker::new(ChunkingConfig {
            note_target_tokens: 100_000,
            ..test_config()
        });
        let document = test_document();
        let huge_text = "a ".repeat(20_000);
        let chunks = chunker.chunk(&document, ChunkSource::Generic(&huge_text)).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= MAX_CHUNK_CHARS);
        }
    }

    #[test]
    fn pdf_pages_get_page_source_refs() {
        let chunker = Chunker::new(test_config());
        let document = test_document();
        let pages = vec!["page one text here".to_string(), "page two text here".to_string()];
        let chunks = chunker.chunk(&document, ChunkSource::Pdf { pages: &pages }).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source_ref.as_deref(), Some("page:1"));
        assert_eq!(chunks[1].source_ref.as_deref(), Some("page:2"));
    }

    #[test]
    fn youtube_without_segments_falls_back_to_recursive_split() {
        let chunker = Chunker::new(test_config());
        let document = test_document();
        let text = "word ".repeat(200);
        let chunks = chunker.chunk(&document, ChunkSource::Youtube { full_text: &text, segments: None }).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks[0].source_ref.is_none());
    }

    #[test]
    fn youtube_segments_emit_timestamp_source_refs() {
        let chunker = Chunker::new(test_config());
        let document = test_document();
        let segments = vec![
            CaptionSegment { start_secs: 0.0, text: "Hello there.".to_string() },
            CaptionSegment { start_secs: 190.0, text: "Second window starts here.".to_string() },
        ];
        let full_text = "Hello there. Second window starts here.".to_string();
        let chunks = chunker
            .chunk(&document, ChunkSource::Youtube { full_text: &full_text, segments: Some(&segments) })
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source_ref.as_deref(), Some("timestamp:0:00"));
        assert_eq!(chunks[1].source_ref.as_deref(), Some("timestamp:3:10"));
    }

    #[test]
    fn contextualize_prefixes_embed_text_but_not_stored_text() {
        let chunker = Chunker::new(test_config());
        let document = test_document();
        let chunks = chunker.chunk(&document, ChunkSource::Generic("short body text")).unwrap();
        let chunk = &chunks[0];
        let embed_text = chunker.embed_text(&document, chunk);

        assert_eq!(chunk.text, "short body text");
        assert!(embed_text.starts_with("Document: \"Test Note\"."));
        assert!(embed_text.ends_with("short body text"));
    }
}
