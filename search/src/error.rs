use photograph_store::StoreError;
use thiserror::Error;

/// Errors returned by similarity queries.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search: top_k must be at least 1")]
    InvalidTopK,

    #[error("search: dimension mismatch for {id}: got {got}, want {want}")]
    DimensionMismatch { id: String, got: usize, want: usize },

    #[error("search: no embeddings for project {0}")]
    NoEmbeddings(String),

    #[error("search: {0}")]
    Store(#[from] StoreError),
}
