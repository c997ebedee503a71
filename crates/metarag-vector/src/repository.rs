//! LanceDB-backed implementation of the vector repository contract.
//!
//! One Lance table per collection. Flattened metadata is stored as JSON next
//! to the chunk text; equality filters scan it to resolve candidate ids and
//! push those down as `id IN (...)`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::table::Table;
use lancedb::Connection;

use metarag_core::boundary::{guarded, CallGuard};
use metarag_core::config::VectorStoreConfig;
use metarag_core::error::{Error, Result};
use metarag_core::traits::{Embedder, VectorRepository};
use metarag_core::types::{FlatMeta, MetaValue, QueryHit, WhereFilter};

use crate::schema::{build_chunk_schema, CONTENT, ID, META_JSON};
use crate::table::{arrow_err, distance_column, id_in_predicate, lance_err, open_db, open_table_if_exists, str_column};

pub struct LanceRepository {
    conn: Connection,
    collection: String,
    embedder: Arc<dyn Embedder>,
    guard: CallGuard,
    embed_timeout: Duration,
}

/// Equality with integer/float cross-comparison, so `1` matches `1.0`.
pub fn meta_value_eq(stored: &MetaValue, wanted: &MetaValue) -> bool {
    match (stored, wanted) {
        (MetaValue::Int(a), MetaValue::Float(b)) | (MetaValue::Float(b), MetaValue::Int(a)) => (*a as f64) == *b,
        (a, b) => a == b,
    }
}

pub fn matches_filter(meta: &FlatMeta, filter: &WhereFilter) -> bool {
    filter.iter().all(|(k, v)| meta.get(k).is_some_and(|stored| meta_value_eq(stored, v)))
}

fn stream_err(e: impl std::fmt::Display) -> Error {
    Error::Connection(format!("lancedb stream: {e}"))
}

fn content_hash(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

impl LanceRepository {
    /// Open the collection described by `config`, creating its directory if needed.
    pub async fn open(config: &VectorStoreConfig, guard: CallGuard) -> Result<Self> {
        let embedder = metarag_embed::get_embedder(&config.embedding_model)
            .map_err(|e| Error::config(format!("collection '{}': {e}", config.collection_name)))?;
        Self::with_embedder(&config.persist_directory, &config.collection_name, embedder, guard).await
    }

    pub async fn with_embedder(
        persist_directory: &Path,
        collection: &str,
        embedder: Arc<dyn Embedder>,
        guard: CallGuard,
    ) -> Result<Self> {
        std::fs::create_dir_all(persist_directory)
            .map_err(|e| Error::connection(format!("{}: {e}", persist_directory.display())))?;
        let uri = persist_directory.to_string_lossy().to_string();
        let conn = guard.run("lancedb connect", open_db(&uri)).await?;
        tracing::debug!(collection, uri = %uri, dim = embedder.dim(), "opened vector collection");
        let embed_timeout = guard.timeout;
        Ok(Self { conn, collection: collection.to_string(), embedder, guard, embed_timeout })
    }

    /// Deadline for a single embedding batch; defaults to the store timeout.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn collection(&self) -> &str { &self.collection }

    /// Number of stored chunks; zero before the first upsert.
    pub async fn count(&self) -> Result<usize> {
        self.guard
            .run("count", async {
                match open_table_if_exists(&self.conn, &self.collection).await? {
                    Some(t) => t.count_rows(None).await.map_err(lance_err),
                    None => Ok(0),
                }
            })
            .await
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let n = texts.len();
        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::Operation(format!("embedding task: {e}")))?
            .map_err(|e| Error::Operation(format!("embedding: {e}")))?;
        if vectors.len() != n {
            return Err(Error::Operation(format!("embedder returned {} vectors for {n} texts", vectors.len())));
        }
        Ok(vectors)
    }

    fn to_record_batch(&self, rows: &[(&String, &String, &FlatMeta)], vectors: Vec<Vec<f32>>) -> Result<RecordBatch> {
        let dim = self.embedder.dim() as i32;
        let mut ids = Vec::new(); let mut contents = Vec::new(); let mut hashes = Vec::new(); let mut metas = Vec::new();
        for (id, content, meta) in rows {
            ids.push(id.to_string()); contents.push(content.to_string()); hashes.push(content_hash(content)); metas.push(serde_json::to_string(meta)?);
        }
        let vectors: Vec<Option<Vec<Option<f32>>>> = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect())).collect();
        RecordBatch::try_new(build_chunk_schema(dim), vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(hashes)),
            Arc::new(StringArray::from(metas)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
        ]).map_err(arrow_err)
    }

    /// Rows of `(id, content, meta)` matching an optional SQL predicate.
    async fn scan(&self, table: &Table, predicate: Option<String>) -> Result<Vec<(String, String, FlatMeta)>> {
        let mut q = table.query().select(Select::columns(&[ID, CONTENT, META_JSON]));
        if let Some(p) = predicate { q = q.only_if(p); }
        let mut stream = q.execute().await.map_err(lance_err)?;
        let mut rows = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(stream_err)? {
            let (ids, contents, metas) = (str_column(&batch, ID)?, str_column(&batch, CONTENT)?, str_column(&batch, META_JSON)?);
            for i in 0..batch.num_rows() {
                let meta: FlatMeta = serde_json::from_str(metas.value(i))?;
                rows.push((ids.value(i).to_string(), contents.value(i).to_string(), meta));
            }
        }
        Ok(rows)
    }

    /// Ids whose metadata satisfies `filter`, optionally restricted to `scope`.
    async fn ids_matching(&self, table: &Table, filter: &WhereFilter, scope: Option<&BTreeSet<String>>) -> Result<BTreeSet<String>> {
        if scope.is_some_and(BTreeSet::is_empty) { return Ok(BTreeSet::new()); }
        Ok(self.scan(table, scope.map(id_in_predicate)).await?.into_iter()
            .filter(|(_, _, meta)| matches_filter(meta, filter))
            .map(|(id, _, _)| id)
            .collect())
    }

    async fn upsert_inner(&self, chunks: &[String], metadatas: &[FlatMeta], ids: &[String]) -> Result<()> {
        // last write wins for ids repeated inside one batch
        let mut by_id: BTreeMap<&String, (&String, &FlatMeta)> = BTreeMap::new();
        for ((id, chunk), meta) in ids.iter().zip(chunks).zip(metadatas) { by_id.insert(id, (chunk, meta)); }
        let rows: Vec<(&String, &String, &FlatMeta)> = by_id.into_iter().map(|(id, (c, m))| (id, c, m)).collect();

        let texts: Vec<String> = rows.iter().map(|(_, c, _)| (*c).clone()).collect();
        let vectors = guarded(&self.guard.cancel, self.embed_timeout, "embed", self.embed(texts)).await?;
        let batch = self.to_record_batch(&rows, vectors)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));

        match open_table_if_exists(&self.conn, &self.collection).await? {
            Some(t) => {
                let mut mi = t.merge_insert(&[ID]);
                mi.when_matched_update_all(None).when_not_matched_insert_all();
                mi.execute(reader).await.map_err(lance_err)?;
            }
            None => {
                self.conn.create_table(&self.collection, reader).execute().await.map_err(lance_err)?;
            }
        }
        tracing::debug!(collection = %self.collection, rows = rows.len(), "upserted chunks");
        Ok(())
    }

    async fn query_inner(&self, query_texts: &[String], k: usize, where_filter: Option<&WhereFilter>) -> Result<Vec<Vec<QueryHit>>> {
        let empty = || vec![Vec::new(); query_texts.len()];
        if k == 0 { return Ok(empty()); }
        let Some(table) = open_table_if_exists(&self.conn, &self.collection).await? else { return Ok(empty()) };
        let predicate = match where_filter {
            Some(f) if !f.is_empty() => {
                let candidates = self.ids_matching(&table, f, None).await?;
                if candidates.is_empty() { return Ok(empty()); }
                Some(id_in_predicate(&candidates))
            }
            _ => None,
        };

        let vectors = guarded(&self.guard.cancel, self.embed_timeout, "embed", self.embed(query_texts.to_vec())).await?;
        let mut results = Vec::with_capacity(vectors.len());
        for v in vectors {
            let mut q = table.vector_search(v).map_err(lance_err)?.limit(k);
            if let Some(p) = &predicate { q = q.only_if(p.clone()); }
            let mut stream = q.execute().await.map_err(lance_err)?;
            let mut hits = Vec::new();
            while let Some(batch) = stream.try_next().await.map_err(stream_err)? {
                let (ids, contents, metas) = (str_column(&batch, ID)?, str_column(&batch, CONTENT)?, str_column(&batch, META_JSON)?);
                let distances = distance_column(&batch);
                for i in 0..batch.num_rows() {
                    hits.push(QueryHit {
                        id: ids.value(i).to_string(),
                        text: contents.value(i).to_string(),
                        meta: serde_json::from_str(metas.value(i))?,
                        distance: distances.map(|d| d.value(i)).unwrap_or(f32::MAX),
                    });
                }
            }
            hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
            hits.truncate(k);
            results.push(hits);
        }
        Ok(results)
    }

    async fn delete_inner(&self, ids: Option<&[String]>, where_filter: Option<&WhereFilter>) -> Result<()> {
        let Some(table) = open_table_if_exists(&self.conn, &self.collection).await? else { return Ok(()) };
        let mut targets: Option<BTreeSet<String>> = ids.map(|ids| ids.iter().cloned().collect());
        if let Some(f) = where_filter {
            targets = Some(self.ids_matching(&table, f, targets.as_ref()).await?);
        }
        let targets = targets.unwrap_or_default();
        if targets.is_empty() { return Ok(()); }
        table.delete(&id_in_predicate(&targets)).await.map_err(lance_err)?;
        tracing::debug!(collection = %self.collection, rows = targets.len(), "deleted chunks");
        Ok(())
    }
}

#[async_trait]
impl VectorRepository for LanceRepository {
    async fn upsert_chunks(&self, chunks: &[String], metadatas: &[FlatMeta], ids: &[String]) -> Result<()> {
        if chunks.len() != metadatas.len() || chunks.len() != ids.len() {
            return Err(Error::validation(format!(
                "upsert length mismatch: chunks={} metadatas={} ids={}",
                chunks.len(), metadatas.len(), ids.len()
            )));
        }
        if chunks.is_empty() {
            tracing::warn!(collection = %self.collection, "upsert called with no chunks");
            return Ok(());
        }
        self.guard.run("upsert", self.upsert_inner(chunks, metadatas, ids)).await
    }

    async fn query_collection(&self, query_texts: &[String], k: usize, where_filter: Option<&WhereFilter>) -> Result<Vec<Vec<QueryHit>>> {
        if query_texts.is_empty() { return Ok(Vec::new()); }
        self.guard.run("query", self.query_inner(query_texts, k, where_filter)).await
    }

    async fn delete_chunks(&self, ids: Option<&[String]>, where_filter: Option<&WhereFilter>) -> Result<()> {
        if ids.is_none() && where_filter.is_none() {
            return Err(Error::validation("delete requires ids or a where filter"));
        }
        self.guard.run("delete", self.delete_inner(ids, where_filter)).await
    }
}
