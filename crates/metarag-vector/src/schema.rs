use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ID: &str = "id";
pub const CONTENT: &str = "content";
pub const CONTENT_HASH: &str = "content_hash";
pub const META_JSON: &str = "meta_json";
pub const VECTOR: &str = "vector";
pub const DISTANCE: &str = "_distance";

/// One row per chunk: text, its blake3 hash, flattened metadata as JSON, embedding.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ID, DataType::Utf8, false),
		Field::new(CONTENT, DataType::Utf8, false),
		Field::new(CONTENT_HASH, DataType::Utf8, false),
		Field::new(META_JSON, DataType::Utf8, false),
		Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
