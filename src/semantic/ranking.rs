//! Query-time ranking: semantic candidate pool, lexical filter, fallback.
//!
//! 1. Rank the whole index by cosine score.
//! 2. Keep the best `pool` candidates.
//! 3. Walk them in order, keeping those that contain a query token, until
//!    `top_k` are kept.
//! 4. If nothing survived, ignore the filter and return the top `top_k` of the
//!    full ranking instead.

use serde::Serialize;

use crate::semantic::index::{IndexError, Ranked, SimilarityIndex};
use crate::semantic::lexical::matches_any;

/// Default number of semantic candidates scanned by the lexical filter.
pub const DEFAULT_CANDIDATE_POOL: usize = 100;

/// A single search hit as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: i64,
    pub text: String,
    /// Raw cosine similarity
    pub score: f32,
}

/// Rank `index` against a normalized query vector and apply the lexical filter.
///
/// `tokens` come from [`crate::semantic::lexical::query_tokens`]; an empty
/// slice skips filtering and yields the plain top `top_k` by score.
pub fn rank_and_filter(
    index: &SimilarityIndex,
    query_vec: &[f32],
    tokens: &[String],
    top_k: usize,
    pool: usize,
) -> Result<Vec<SearchResult>, IndexError> {
    let ranked = index.rank(query_vec)?;

    let filtered: Vec<SearchResult> = ranked
        .iter()
        .take(pool)
        .filter(|r| {
            index
                .get(r.position)
                .is_some_and(|entry| matches_any(&entry.text, tokens))
        })
        .take(top_k)
        .filter_map(|r| to_result(index, r))
        .collect();

    if !filtered.is_empty() {
        return Ok(filtered);
    }

    // fallback draws from the full ranking, not just the pool
    Ok(ranked
        .iter()
        .take(top_k)
        .filter_map(|r| to_result(index, r))
        .collect())
}

fn to_result(index: &SimilarityIndex, ranked: &Ranked) -> Option<SearchResult> {
    index.get(ranked.position).map(|entry| SearchResult {
        id: entry.id,
        text: entry.text.clone(),
        score: ranked.score,
    })
}
