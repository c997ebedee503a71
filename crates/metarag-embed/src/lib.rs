use anyhow::{anyhow, Result};
use std::sync::Arc;

pub use metarag_core::traits::Embedder;

pub const DEFAULT_DIM: usize = 384;

/// Deterministic feature-hashing embedder.
///
/// Each lowercased token is hashed with xxh64 into one of `dim` buckets; the
/// bucket receives a weight derived from the upper hash bits. Output is
/// L2-normalized, so texts sharing words land close together.
pub struct HashEmbedder { dim: usize, seed: u64 }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1), seed: 0 } }

    pub fn with_seed(dim: usize, seed: u64) -> Self { Self { dim: dim.max(1), seed } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()).filter(|t| !t.is_empty()).enumerate() {
            let mut hasher = XxHash64::with_seed(self.seed); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

/// Resolve an `embedding_model` name from the store configuration.
///
/// Accepted forms: `hash`, `hash:xxh64`, `hash:xxh64:d<dim>`.
pub fn get_embedder(model: &str) -> Result<Arc<dyn Embedder>> {
    let mut parts = model.trim().split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("hash"), None | Some("xxh64"), dim) => {
            let dim = match dim {
                None => DEFAULT_DIM,
                Some(d) => d.strip_prefix('d').and_then(|n| n.parse::<usize>().ok()).filter(|n| *n > 0)
                    .ok_or_else(|| anyhow!("invalid embedding dimension '{d}' in '{model}'"))?,
            };
            tracing::debug!(model, dim, "using hash embedder");
            Ok(Arc::new(HashEmbedder::new(dim)))
        }
        _ => Err(anyhow!("unsupported embedding model '{model}'")),
    }
}
