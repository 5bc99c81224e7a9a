use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray, UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::types::ChunkRecord;

/// The chunk table: one row per `Chunk`, vector-indexed for ANN search.
pub struct VectorStore {
    db: lancedb::Connection,
    dimension: usize,
    table_name: String,
}

impl VectorStore {
    pub async fn new(path: &str, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(path).ok();
        let db = lancedb::connect(path)
            .execute()
            .await
            .context("failed to connect to LanceDB")?;

        let store = Self {
            db,
            dimension,
            table_name: "chunks".to_string(),
        };
        store.ensure_table().await?;
        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("namespace", DataType::Utf8, false),
            Field::new("source_ref", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
            Field::new("created_at", DataType::Int64, false),
        ]))
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if names.contains(&self.table_name) {
            return Ok(());
        }

        // LanceDB infers column types from the first batch, so we create the
        // table with a throwaway seed row and delete it immediately.
        let schema = self.schema();
        let seed_vec = vec![0.0f32; self.dimension];
        let values = Float32Array::from(seed_vec);
        let vector_field = Field::new("item", DataType::Float32, true);
        let vector_array = FixedSizeListArray::new(
            Arc::new(vector_field),
            self.dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        );

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["__seed__"])) as Arc<dyn Array>,
                Arc::new(StringArray::from(vec!["__seed__"])),
                Arc::new(UInt32Array::from(vec![0u32])),
                Arc::new(StringArray::from(vec![""])),
                Arc::new(StringArray::from(vec![""])),
                Arc::new(StringArray::from(vec![""])),
                Arc::new(StringArray::from(vec![""])),
                Arc::new(vector_array) as Arc<dyn Array>,
                Arc::new(Int64Array::from(vec![0i64])),
            ],
        )
        .context("failed to build seed batch")?;

        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.db
            .create_table(&self.table_name, Box::new(batches))
            .execute()
            .await
            .context("failed to create chunks table")?;

        let table = self.db.open_table(&self.table_name).execute().await?;
        table.delete("id = '__seed__'").await.ok();
        Ok(())
    }

    pub async fn upsert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("failed to open chunks table")?;

        let len = chunks.len();
        let schema = self.schema();

        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let document_ids: Vec<&str> = chunks.iter().map(|c| c.document_id.as_str()).collect();
        let chunk_indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let titles: Vec<&str> = chunks.iter().map(|c| c.title.as_str()).collect();
        let namespaces: Vec<&str> = chunks.iter().map(|c| c.namespace.as_str()).collect();
        let source_refs: Vec<&str> = chunks.iter().map(|c| c.source_ref.as_str()).collect();
        let created_ats: Vec<i64> = chunks.iter().map(|c| c.created_at).collect();

        let flat_vectors: Vec<f32> = chunks.iter().flat_map(|c| c.vector.iter().copied()).collect();
        let values = Float32Array::from(flat_vectors);
        let vector_field = Field::new("item", DataType::Float32, true);
        let vector_array = FixedSizeListArray::new(
            Arc::new(vector_field),
            self.dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        );

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(ids)) as Arc<dyn Array>,
                Arc::new(StringArray::from(document_ids)),
                Arc::new(UInt32Array::from(chunk_indices)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(namespaces)),
                Arc::new(StringArray::from(source_refs)),
                Arc::new(vector_array) as Arc<dyn Array>,
                Arc::new(Int64Array::from(created_ats)),
            ],
        )
        .context("failed to build chunk batch")?;

        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table
            .add(Box::new(reader))
            .execute()
            .await
            .context("failed to insert chunks")?;

        tracing::debug!(count = len, "inserted chunks into vector store");
        Ok(())
    }

    /// Pre-filters by ANN distance before any join or dedup step — never a
    /// full scan of the chunk table.
    pub async fn vector_search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        let table = self.db.open_table(&self.table_name).execute().await?;

        let mut query_builder = table.query().nearest_to(query)?;
        query_builder = query_builder
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(k);

        if let Some(predicate) = filter {
            query_builder = query_builder.only_if(predicate);
        }

        let results = query_builder
            .execute()
            .await
            .context("vector search failed")?;
        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(dedup_by_document(extract_hits(&batches)))
    }

    pub async fn delete_by_document_id(&self, document_id: &str) -> Result<usize> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        let before = table.count_rows(None).await.unwrap_or(0);
        let predicate = format!("document_id = '{}'", document_id.replace('\'', "''"));
        table.delete(&predicate).await?;
        let after = table.count_rows(None).await.unwrap_or(0);
        Ok(before - after)
    }

    pub async fn clear(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if names.contains(&self.table_name) {
            self.db.drop_table(&self.table_name, &[]).await?;
        }
        self.ensure_table().await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        Ok(table.count_rows(None).await?)
    }

    /// Creates the ANN index once the table has enough rows to benefit from
    /// one; cheap to call repeatedly since it's a no-op below the threshold.
    pub async fn create_index_if_needed(&self) -> Result<()> {
        let count = self.count().await?;
        if count >= 1_000 {
            let table = self.db.open_table(&self.table_name).execute().await?;
            table
                .create_index(&["vector"], lancedb::index::Index::Auto)
                .execute()
                .await
                .context("failed to create vector index")?;
            tracing::info!(rows = count, "created ANN index on chunk vectors");
        }
        Ok(())
    }

    /// Fetches neighboring chunks (±window) for context expansion.
    pub async fn get_neighbors(
        &self,
        document_id: &str,
        chunk_index: u32,
        window: u32,
    ) -> Result<Vec<VectorHit>> {
        let table = self.db.open_table(&self.table_name).execute().await?;

        let low = chunk_index.saturating_sub(window);
        let high = chunk_index.saturating_add(window);
        let predicate = format!(
            "document_id = '{}' AND chunk_index >= {} AND chunk_index <= {} AND chunk_index != {}",
            document_id.replace('\'', "''"),
            low,
            high,
            chunk_index
        );

        let results = table
            .query()
            .only_if(predicate)
            .execute()
            .await
            .context("neighbor lookup failed")?;
        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        let mut hits = extract_hits(&batches);
        hits.sort_by_key(|h| h.chunk_index);
        Ok(hits)
    }

    /// Fetches the chunks belonging to one document, ordered by `chunk_index`.
    /// Used to backfill lexical-only hits (which resolve to a document, not a
    /// chunk) with representative chunk text.
    pub async fn chunks_for_document(&self, document_id: &str, limit: usize) -> Result<Vec<VectorHit>> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        let predicate = format!("document_id = '{}'", document_id.replace('\'', "''"));

        let results = table
            .query()
            .only_if(predicate)
            .execute()
            .await
            .context("document chunk lookup failed")?;
        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        let mut hits = extract_hits(&batches);
        hits.sort_by_key(|h| h.chunk_index);
        hits.truncate(limit);
        Ok(hits)
    }

    /// Looks up chunks by id, for backfilling lexical-only hits with chunk text.
    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<VectorHit>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut all_hits = Vec::new();

        for chunk in ids.chunks(50) {
            let id_list: Vec<String> = chunk
                .iter()
                .map(|id| format!("'{}'", id.replace('\'', "''")))
                .collect();
            let predicate = format!("id IN ({})", id_list.join(", "));

            let results = table
                .query()
                .only_if(predicate)
                .execute()
                .await
                .context("id lookup failed")?;
            let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
            all_hits.extend(extract_hits(&batches));
        }

        Ok(all_hits)
    }
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub title: String,
    pub namespace: String,
    pub source_ref: String,
    pub score: f32,
}

/// The store de-duplicates vector hits by document, keeping the best-scoring
/// chunk per document.
fn dedup_by_document(hits: Vec<VectorHit>) -> Vec<VectorHit> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        if seen.insert(hit.document_id.clone()) {
            out.push(hit);
        }
    }
    out
}

fn extract_hits(batches: &[RecordBatch]) -> Vec<VectorHit> {
    let mut hits = Vec::new();
    for batch in batches {
        let ids = batch.column_by_name("id").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let texts = batch.column_by_name("text").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let titles = batch.column_by_name("title").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let namespaces = batch.column_by_name("namespace").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let source_refs = batch.column_by_name("source_ref").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let document_ids = batch.column_by_name("document_id").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let chunk_indices = batch.column_by_name("chunk_index").and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
        let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let (Some(ids), Some(texts), Some(titles)) = (ids, texts, titles) else {
            continue;
        };

        for i in 0..batch.num_rows() {
            if ids.value(i) == "__seed__" {
                continue;
            }
            let score = distances.map(|d| (1.0 - d.value(i)).max(0.0)).unwrap_or(0.0);
            hits.push(VectorHit {
                id: ids.value(i).to_string(),
                document_id: document_ids.map(|d| d.value(i).to_string()).unwrap_or_default(),
                chunk_index: chunk_indices.map(|c| c.value(i)).unwrap_or(0),
                text: texts.value(i).to_string(),
                title: titles.value(i).to_string(),
                namespace: namespaces.map(|n| n.value(i).to_string()).unwrap_or_default(),
                source_ref: source_refs.map(|s| s.value(i).to_string()).unwrap_or_default(),
                score,
            });
        }
    }
    hits
}
