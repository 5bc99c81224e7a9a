use std::path::Path;

use anyhow::{Context, Result};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{self, Schema, STORED, STRING, TEXT, Value as TantivyValue};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

/// Full-text index over `Document.lexical_text()` (title + summary + tags +
/// auto_tags), kept in sync with the Store by a write-time trigger — callers
/// never construct raw queries against it.
pub struct LexicalStore {
    index: Index,
    reader: IndexReader,
    writer: parking_lot::Mutex<IndexWriter>,
    id_field: schema::Field,
    text_field: schema::Field,
    namespace_field: schema::Field,
}

impl LexicalStore {
    /// `id` is STRING (indexed, untokenized) so `delete_term`/`TermQuery` work.
    fn build_schema() -> (Schema, schema::Field, schema::Field, schema::Field) {
        let mut sb = Schema::builder();
        let id_field = sb.add_text_field("id", STRING | STORED);
        let text_field = sb.add_text_field("text", TEXT | STORED);
        let namespace_field = sb.add_text_field("namespace", TEXT | STORED);
        (sb.build(), id_field, text_field, namespace_field)
    }

    pub fn new(path: &str) -> Result<Self> {
        let index_path = Path::new(path).join("lexical_index");
        std::fs::create_dir_all(&index_path).ok();

        let (schema, id_field, text_field, namespace_field) = Self::build_schema();

        let index = {
            let dir = tantivy::directory::MmapDirectory::open(&index_path)?;
            if Index::exists(&dir)? {
                Index::open_in_dir(&index_path)?
            } else {
                Index::create_in_dir(&index_path, schema.clone())?
            }
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("failed to build lexical reader")?;

        let writer = index.writer(50_000_000).context("failed to build lexical writer")?;

        Ok(Self {
            index,
            reader,
            writer: parking_lot::Mutex::new(writer),
            id_field,
            text_field,
            namespace_field,
        })
    }

    pub fn index_document(&self, document_id: &str, text: &str, namespace: &str) -> Result<()> {
        let writer = self.writer.lock();
        writer.add_document(doc!(
            self.id_field => document_id,
            self.text_field => text,
            self.namespace_field => namespace,
        ))?;
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.commit().context("lexical commit failed")?;
        self.reader.reload()?;
        Ok(())
    }

    /// Returns `(document_id, rank_score)` pairs, best first.
    pub fn search(&self, query: &str, k: usize, namespace: Option<&str>) -> Result<Vec<(String, f32)>> {
        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);

        let parsed_query = match query_parser.parse_query(query) {
            Ok(q) => q,
            Err(_) => {
                let escaped = query.replace('"', "");
                query_parser.parse_query(&format!("\"{escaped}\""))?
            }
        };

        let fetch_limit = if namespace.is_some() { k * 3 } else { k };
        let top_docs = searcher.search(&parsed_query, &TopDocs::with_limit(fetch_limit))?;

        let mut results = Vec::with_capacity(k);
        for (score, doc_address) in top_docs {
            let Ok(tdoc) = searcher.doc::<TantivyDocument>(doc_address) else {
                continue;
            };

            if let Some(prefix) = namespace {
                let doc_ns = tdoc
                    .get_first(self.namespace_field)
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                if !doc_ns.starts_with(prefix) {
                    continue;
                }
            }

            if let Some(id_text) = tdoc.get_first(self.id_field).and_then(|v| v.as_str()) {
                results.push((id_text.to_string(), score));
                if results.len() >= k {
                    break;
                }
            }
        }

        Ok(results)
    }

    pub fn delete_by_document_id(&self, document_id: &str) -> Result<()> {
        let writer = self.writer.lock();
        let term = tantivy::Term::from_field_text(self.id_field, document_id);
        writer.delete_term(term);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.delete_all_documents()?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }
}
