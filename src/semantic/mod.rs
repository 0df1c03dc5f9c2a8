//! Semantic product search.
//!
//! Encodes product names into dense vectors with fastembed and answers
//! queries by cosine similarity, sharpened by a lexical substring filter.
//!
//! # Architecture
//!
//! - `embeddings`: Embedder capability and the fastembed-backed model
//! - `index`: Immutable in-memory index of normalized vectors
//! - `lexical`: Query tokens and the substring filter
//! - `ranking`: Candidate pool, filter and fallback
//! - `preprocess`: Display-text derivation
//! - `service`: Index lifecycle and the search entry point

pub mod embeddings;
pub mod index;
pub mod lexical;
mod preprocess;
pub mod ranking;
mod service;

pub use embeddings::{Embedder, EmbeddingModel, UnavailableEmbedder, DEFAULT_BATCH_SIZE};
pub use preprocess::display_text;
pub use ranking::{SearchResult, DEFAULT_CANDIDATE_POOL};
pub use service::{SearchError, SearchService};

/// Default embedding model (multilingual, 384 dimensions)
pub const DEFAULT_MODEL: &str = "paraphrase-multilingual-MiniLM-L12-v2";
