use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FlatMeta, QueryHit, WhereFilter};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Structured entity of the metadata model.
pub trait Entity {
    fn to_dict(&self) -> serde_json::Value;

    fn to_searchable_metadata(&self) -> Result<FlatMeta>;

    fn as_json(&self) -> String {
        self.to_dict().to_string()
    }
}

/// Collection of text chunks with flat metadata, searchable by similarity.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Insert or replace chunks by id. All three slices must have equal length.
    async fn upsert_chunks(&self, chunks: &[String], metadatas: &[FlatMeta], ids: &[String]) -> Result<()>;

    /// One ranked list per query text, at most `k` hits each.
    async fn query_collection(
        &self,
        query_texts: &[String],
        k: usize,
        where_filter: Option<&WhereFilter>,
    ) -> Result<Vec<Vec<QueryHit>>>;

    /// Delete by ids, by filter, or both. At least one selector is required.
    async fn delete_chunks(&self, ids: Option<&[String]>, where_filter: Option<&WhereFilter>) -> Result<()>;
}
