use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DocumentChunk;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

/// A source document paired with its sidecar path (which may not exist).
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub doc_id: String,
    pub path: PathBuf,
    pub sidecar: PathBuf,
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// `.txt` and `.md` files under `data_dir`, sorted, each with its `<stem>.json` sidecar path.
    pub fn list_documents(&self, data_dir: &Path, limit: Option<usize>) -> Vec<SourceDocument> {
        let mut docs: Vec<SourceDocument> = self.list_text_files(data_dir).into_iter().filter_map(|path| {
            let doc_id = path.file_stem()?.to_string_lossy().to_string();
            let sidecar = path.with_extension("json");
            Some(SourceDocument { doc_id, path, sidecar })
        }).collect();
        if let Some(limit) = limit {
            if docs.len() > limit { docs.truncate(limit); tracing::info!(limit, "limited to first documents"); }
        }
        docs
    }

    pub fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => {
                let bytes = fs::read(file_path).map_err(|e| Error::NotFound(format!("{}: {e}", file_path.display())))?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
        }
    }

    pub fn chunk_content(&self, content: &str, doc_id: &str, file_path: &Path) -> Vec<DocumentChunk> {
        let doc_path = file_path.to_string_lossy().to_string();
        let mut texts = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim(); if paragraph.is_empty() { continue; }
            if self.count_tokens(paragraph) <= self.chunking_config.max_tokens { texts.push(paragraph.to_string()); }
            else { texts.extend(self.split_paragraph_with_overlap(paragraph)); }
        }
        let total_chunks = texts.len();
        texts.into_iter().enumerate().map(|(chunk_index, content)| DocumentChunk {
            id: format!("{doc_id}:{chunk_index}"), doc_id: doc_id.to_string(), doc_path: doc_path.clone(), content, chunk_index, total_chunks,
        }).collect()
    }

    fn count_tokens(&self, text: &str) -> usize { let word_count = text.split_whitespace().count(); (word_count as f32 / 0.75) as usize }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = ((self.chunking_config.max_tokens as f32 * 0.75) as usize).max(1);
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new(); let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_text_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if matches!(path.extension().and_then(|s| s.to_str()), Some("txt" | "md")) { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}
