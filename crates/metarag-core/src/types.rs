//! Domain types shared by the flattening engine, the vector repository and the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type ChunkId = String;

/// Scalar value admitted by the vector index filter surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    /// Convert a JSON scalar. Arrays, objects and null are not scalars.
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self { Self::Str(s.to_string()) }
}
impl From<String> for MetaValue {
    fn from(s: String) -> Self { Self::Str(s) }
}
impl From<i64> for MetaValue {
    fn from(i: i64) -> Self { Self::Int(i) }
}
impl From<f64> for MetaValue {
    fn from(x: f64) -> Self { Self::Float(x) }
}
impl From<bool> for MetaValue {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

/// Flattened, filterable metadata. Keys are ordered for deterministic output.
pub type FlatMeta = BTreeMap<String, MetaValue>;

/// Equality filter over flattened keys.
pub type WhereFilter = BTreeMap<String, MetaValue>;

/// A chunk of a source document that is independently indexed.
///
/// - `id`: globally unique chunk identifier
/// - `doc_id`: stable document identity (file stem or sidecar id)
/// - `doc_path`: original path to the source file
/// - `content`: the text payload of the chunk
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// One ranked hit returned by the vector repository. Lower `distance` is closer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: ChunkId,
    pub text: String,
    pub meta: FlatMeta,
    pub distance: f32,
}
