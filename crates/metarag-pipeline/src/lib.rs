//! Document ingestion: sidecar → metadata aggregate → facts, chunks and
//! flattened metadata → vector collections.
//!
//! Documents are processed one at a time. Failures local to one document
//! (unreadable text, malformed sidecar, invalid aggregate) skip that document;
//! failures of the vector store or rule engine abort the run. Within one run a
//! document id may be claimed only once; later documents reusing it are skipped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use metarag_core::data_processor::{ChunkingConfig, DataProcessor, SourceDocument};
use metarag_core::error::{Error, Result};
use metarag_core::flatten::{flatten_metadata, merge_disjoint};
use metarag_core::metadata::Metadata;
use metarag_core::sidecar::Sidecar;
use metarag_core::traits::{Entity, VectorRepository};
use metarag_core::types::{DocumentChunk, FlatMeta, MetaValue};
use metarag_logic::ConsistencyChecker;

pub const DEFAULT_REFERENCE_SYSTEM: &str = "WGS84";

/// `[ingest]` configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub reference_system_id: String,
    pub chunk_collection: String,
    pub source_collection: Option<String>,
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            reference_system_id: DEFAULT_REFERENCE_SYSTEM.to_string(),
            chunk_collection: "documents".to_string(),
            source_collection: None,
            max_tokens: 500,
            overlap_percent: 0.2,
        }
    }
}

impl IngestSettings {
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig { max_tokens: self.max_tokens, overlap_percent: self.overlap_percent }
    }
}

/// Everything derived from one document before anything is stored.
#[derive(Debug)]
pub struct PreparedDocument {
    pub doc_id: String,
    pub metadata: Metadata,
    pub chunks: Vec<DocumentChunk>,
    pub chunk_metas: Vec<FlatMeta>,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub sources: usize,
    pub facts: usize,
    /// `(doc_id, reason)` for each skipped document.
    pub skipped: Vec<(String, String)>,
}

pub struct IngestPipeline {
    processor: DataProcessor,
    chunk_store: Arc<dyn VectorRepository>,
    source_store: Option<Arc<dyn VectorRepository>>,
    checker: Option<Arc<ConsistencyChecker>>,
    reference_system_id: String,
}

impl IngestPipeline {
    pub fn new(processor: DataProcessor, chunk_store: Arc<dyn VectorRepository>) -> Self {
        Self {
            processor,
            chunk_store,
            source_store: None,
            checker: None,
            reference_system_id: DEFAULT_REFERENCE_SYSTEM.to_string(),
        }
    }

    pub fn with_source_store(mut self, store: Arc<dyn VectorRepository>) -> Self {
        self.source_store = Some(store);
        self
    }

    pub fn with_checker(mut self, checker: Arc<ConsistencyChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn with_reference_system(mut self, id: impl Into<String>) -> Self {
        self.reference_system_id = id.into();
        self
    }

    /// Read, map and flatten one document. Touches no store.
    pub fn prepare(&self, doc: &SourceDocument) -> Result<PreparedDocument> {
        let sidecar = if doc.sidecar.is_file() {
            Sidecar::load(&doc.sidecar)?
        } else {
            tracing::debug!(doc = %doc.doc_id, "no sidecar, using defaults");
            Sidecar::default()
        };
        let metadata = sidecar.to_metadata(&doc.doc_id, &self.reference_system_id)?;
        let doc_id = sidecar.doc_id(&doc.doc_id).to_string();

        let content = self.processor.read_file_content(&doc.path)?;
        let chunks = self.processor.chunk_content(&content, &doc_id, &doc.path);
        if chunks.is_empty() {
            return Err(Error::validation(format!("document '{doc_id}' has no text")));
        }

        let mut base = flatten_metadata(&metadata);
        if let Some(contents) = metadata.contents.first() {
            base = merge_disjoint(base, contents.to_searchable_metadata()?)?;
        }
        let chunk_metas = chunks
            .iter()
            .map(|c| merge_disjoint(base.clone(), chunk_keys(c)))
            .collect::<Result<Vec<_>>>()?;
        Ok(PreparedDocument { doc_id, metadata, chunks, chunk_metas })
    }

    /// Submit facts and upsert chunks and sources of a prepared document.
    pub async fn store(&self, prepared: &PreparedDocument, report: &mut IngestReport) -> Result<()> {
        if let Some(checker) = &self.checker {
            report.facts += checker.submit(&prepared.metadata).await?;
        }

        let texts: Vec<String> = prepared.chunks.iter().map(|c| c.content.clone()).collect();
        let ids: Vec<String> = prepared.chunks.iter().map(|c| c.id.clone()).collect();
        self.chunk_store.upsert_chunks(&texts, &prepared.chunk_metas, &ids).await?;
        report.chunks += texts.len();

        if let Some(store) = &self.source_store {
            let mut texts = Vec::new();
            let mut metas = Vec::new();
            let mut ids = Vec::new();
            for src in &prepared.metadata.sources {
                let mut meta = src.to_collection_metadata()?;
                meta.insert("metadata_id".into(), prepared.metadata.id.as_str().into());
                texts.push(src.citation_id.clone());
                metas.push(meta);
                ids.push(src.id.clone());
            }
            store.upsert_chunks(&texts, &metas, &ids).await?;
            report.sources += ids.len();
        }
        report.documents += 1;
        Ok(())
    }

    /// Ingest documents in order. `on_document` is called after each one, stored or skipped.
    pub async fn run<F>(&self, docs: &[SourceDocument], mut on_document: F) -> anyhow::Result<IngestReport>
    where
        F: FnMut(&SourceDocument),
    {
        let mut report = IngestReport::default();
        // document id -> path that claimed it first
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();
        for doc in docs {
            let prepared = self.prepare(doc).and_then(|p| match claimed.get(&p.doc_id) {
                Some(first) => Err(Error::validation(format!(
                    "document id '{}' already used by {}",
                    p.doc_id,
                    first.display()
                ))),
                None => {
                    claimed.insert(p.doc_id.clone(), doc.path.clone());
                    Ok(p)
                }
            });
            match prepared {
                Ok(prepared) => self.store(&prepared, &mut report).await.map_err(|e| {
                    tracing::error!(doc = %doc.doc_id, error = %e, "ingest aborted");
                    anyhow::anyhow!("ingesting {}: {e}", doc.path.display())
                })?,
                Err(e) => {
                    tracing::warn!(doc = %doc.doc_id, error = %e, "document skipped");
                    report.skipped.push((doc.doc_id.clone(), e.to_string()));
                }
            }
            on_document(doc);
        }
        tracing::info!(
            documents = report.documents,
            chunks = report.chunks,
            skipped = report.skipped.len(),
            "ingest finished"
        );
        Ok(report)
    }

    /// Contents ids claimed by more than one metadata root among the documents submitted so far.
    pub async fn check(&self) -> Result<Vec<String>> {
        match &self.checker {
            Some(c) => c.check_composition_consistency().await,
            None => Ok(Vec::new()),
        }
    }
}

fn chunk_keys(chunk: &DocumentChunk) -> FlatMeta {
    let mut m = FlatMeta::new();
    m.insert("doc_id".into(), chunk.doc_id.as_str().into());
    m.insert("doc_path".into(), chunk.doc_path.as_str().into());
    m.insert("chunk_index".into(), MetaValue::Int(chunk.chunk_index as i64));
    m.insert("total_chunks".into(), MetaValue::Int(chunk.total_chunks as i64));
    m
}
