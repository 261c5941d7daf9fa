//! In-memory vector index with JSON persistence.

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the persisted index inside the storage directory.
pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub source: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub source: String,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    pub embedding_model: String,
    pub chunks: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            chunks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn push(&mut self, chunk: IndexedChunk) {
        self.chunks.push(chunk);
    }

    /// Top `k` chunks by cosine similarity, best first.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|c| (cosine_similarity(query_embedding, &c.embedding), c))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, c)| ScoredChunk {
                source: c.source.clone(),
                text: c.text.clone(),
                score,
            })
            .collect()
    }

    pub fn save(&self, storage_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(storage_dir)?;
        let data = serde_json::to_string(self)
            .map_err(|e| AppError::Index(format!("Failed to encode index: {e}")))?;
        std::fs::write(storage_dir.join(INDEX_FILE), data)?;
        Ok(())
    }

    pub fn load(storage_dir: &Path) -> Result<Self> {
        let path = storage_dir.join(INDEX_FILE);
        let data = std::fs::read_to_string(&path)
            .map_err(|e| AppError::Index(format!("Failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| AppError::Index(format!("Corrupt index {}: {e}", path.display())))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}
