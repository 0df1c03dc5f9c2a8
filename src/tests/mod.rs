//! Cross-module test suites and shared fixtures.
//!
//! The embedders here are deterministic stand-ins for the fastembed model so
//! ranking behaviour can be tested without downloading anything.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::products::ProductRecord;
use crate::semantic::embeddings::{Embedder, EmbeddingError};


/// Build catalog records from `(id, text)` pairs.
pub fn catalog(items: &[(i64, &str)]) -> Vec<ProductRecord> {
    items
        .iter()
        .map(|(id, text)| ProductRecord {
            id: *id,
            text: text.to_string(),
        })
        .collect()
}

/// Bag-of-trigrams embedder: texts sharing character trigrams point the same
/// way. Empty text embeds to the zero vector.
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: 64 }
    }
}

impl HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dimensions];
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        for gram in chars.windows(chars.len().clamp(1, 3)) {
            let mut hasher = DefaultHasher::new();
            gram.hash(&mut hasher);
            v[(hasher.finish() % self.dimensions as u64) as usize] += 1.0;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn name(&self) -> &str {
        "hash-trigram"
    }
}

/// Embedder with hand-picked vectors; unknown texts get `fallback`.
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, &[f32])], fallback: &[f32]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
            fallback: fallback.to_vec(),
        }
    }
}

impl Embedder for TableEmbedder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| self.table.get(t).cloned().unwrap_or_else(|| self.fallback.clone()))
            .collect())
    }

    fn name(&self) -> &str {
        "table"
    }
}
