//! In-memory similarity index over normalized product embeddings.
//!
//! The index is built in one shot from a product catalog and never mutated
//! afterwards. Every entry carries its identifier, display text and unit
//! vector together, so the three can never drift out of step.

use rayon::prelude::*;

use crate::products::ProductRecord;

/// Norm floor applied before division so all-zero embeddings stay finite.
pub const NORM_EPSILON: f32 = 1e-8;

/// One indexed product.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Product identifier
    pub id: i64,
    /// Display text that was embedded
    pub text: String,
    /// Embedding divided by its (floored) L2 norm
    pub vector: Vec<f32>,
}

/// Immutable similarity index for one catalog generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

/// A position in the index paired with its cosine score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub position: usize,
    pub score: f32,
}

impl SimilarityIndex {
    /// Build an index from catalog records and their raw embeddings.
    ///
    /// `embeddings` must be parallel to `records` and share one dimension.
    /// Each vector is normalized on the way in.
    pub fn from_embeddings(
        records: Vec<ProductRecord>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if records.len() != embeddings.len() {
            return Err(IndexError::LengthMismatch {
                records: records.len(),
                embeddings: embeddings.len(),
            });
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);

        let entries = records
            .into_iter()
            .zip(embeddings)
            .map(|(record, embedding)| {
                if embedding.len() != dimensions {
                    return Err(IndexError::DimensionMismatch {
                        expected: dimensions,
                        got: embedding.len(),
                    });
                }
                Ok(IndexEntry {
                    id: record.id,
                    text: record.text,
                    vector: normalize(&embedding),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entries,
            dimensions,
        })
    }

    /// Embedding dimension shared by every entry (0 for an empty catalog).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Dot product of `query` against every entry, in index order.
    ///
    /// `query` must already be normalized for the result to be a cosine score.
    pub fn score_all(&self, query: &[f32]) -> Result<Vec<f32>, IndexError> {
        if !self.is_empty() && query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        Ok(self
            .entries
            .par_iter()
            .map(|entry| dot(&entry.vector, query))
            .collect())
    }

    /// Every entry ranked by descending score. Ties keep index order.
    pub fn rank(&self, query: &[f32]) -> Result<Vec<Ranked>, IndexError> {
        let scores = self.score_all(query)?;

        let mut ranked: Vec<Ranked> = scores
            .into_iter()
            .enumerate()
            .map(|(position, score)| Ranked { position, score })
            .collect();

        // sort_by is stable, so equal scores stay in insertion order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(ranked)
    }
}

/// Divide `v` by its L2 norm, floored at [`NORM_EPSILON`].
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v).max(NORM_EPSILON);
    v.iter().map(|x| x / norm).collect()
}

/// Compute L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Errors that can occur while building or querying the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Got {embeddings} embeddings for {records} records")]
    LengthMismatch { records: usize, embeddings: usize },
}
