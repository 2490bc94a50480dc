use photograph_store::StoreError;
use thiserror::Error;

/// Errors returned by projection operations.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("projection: empty input")]
    EmptyInput,

    #[error("projection: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("projection: corrupt model: {0}")]
    ModelCorrupt(String),

    #[error("projection: persist: {0}")]
    Persist(#[from] StoreError),
}
