//! Exact similarity search over a project's raw embeddings.
//!
//! [`SimilaritySearchEngine`] scans every stored vector of a project,
//! scores it against the query by cosine similarity and returns the best
//! `top_k` matches. It never reads projection state.

mod cosine;
mod engine;
mod error;

pub use cosine::cosine_similarity;
pub use engine::{QueryResult, SimilaritySearchEngine};
pub use error::SearchError;
