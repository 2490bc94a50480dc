//! Per-project ingestion, projection refresh and similarity queries.
//!
//! [`Service`] is the entry point. It validates requests, runs batch
//! ingestion through [`ProjectionPipeline`] and answers similarity
//! queries through [`photograph_search::SimilaritySearchEngine`].

mod error;
mod locks;
mod pipeline;
mod service;
mod types;

#[cfg(test)]
mod tests;

pub use error::PipelineError;
pub use locks::ProjectLocks;
pub use pipeline::{
    DEFAULT_ENCODE_TIMEOUT, DEFAULT_MAX_CONCURRENCY, PipelineConfig, ProjectionPipeline,
};
pub use service::{Service, ServiceConfig};
pub use types::{
    DEFAULT_TOP_K, IngestItem, IngestRequest, IngestResponse, ModelSummary, PlotPoint, QueryMode,
    QueryRequest,
};

pub use photograph_search::QueryResult;
