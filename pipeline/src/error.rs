use photograph_embed::EncodeError;
use photograph_projection::ProjectionError;
use photograph_search::SearchError;
use photograph_store::StoreError;
use thiserror::Error;

/// Caller-facing error kinds of ingestion and query operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("pipeline: invalid request: {0}")]
    Validation(String),

    #[error("pipeline: external fetch: {0}")]
    ExternalFetch(String),

    #[error("pipeline: persist: {0}")]
    Persist(#[from] StoreError),

    #[error("pipeline: no embeddings for project {0}")]
    NoEmbeddings(String),

    #[error("pipeline: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("pipeline: projection: {0}")]
    Projection(String),
}

impl From<ProjectionError> for PipelineError {
    fn from(e: ProjectionError) -> Self {
        match e {
            ProjectionError::DimensionMismatch { got, want } => {
                PipelineError::DimensionMismatch { got, want }
            }
            ProjectionError::Persist(e) => PipelineError::Persist(e),
            e @ (ProjectionError::EmptyInput | ProjectionError::ModelCorrupt(_)) => {
                PipelineError::Projection(e.to_string())
            }
        }
    }
}

impl From<SearchError> for PipelineError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidTopK => PipelineError::Validation(e.to_string()),
            SearchError::DimensionMismatch { got, want, .. } => {
                PipelineError::DimensionMismatch { got, want }
            }
            SearchError::NoEmbeddings(project) => PipelineError::NoEmbeddings(project),
            SearchError::Store(e) => PipelineError::Persist(e),
        }
    }
}

impl From<EncodeError> for PipelineError {
    fn from(e: EncodeError) -> Self {
        PipelineError::ExternalFetch(e.to_string())
    }
}
