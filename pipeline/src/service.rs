use std::sync::Arc;

use photograph_embed::Encoder;
use photograph_projection::{IncrementalProjector, ProjectorConfig};
use photograph_search::{QueryResult, SimilaritySearchEngine};
use photograph_store::{ModelStore, VectorRepository};
use tracing::debug;

use crate::error::PipelineError;
use crate::pipeline::{PipelineConfig, ProjectionPipeline};
use crate::types::{IngestRequest, IngestResponse, ModelSummary, PlotPoint, QueryRequest};

/// Configures a [Service].
pub struct ServiceConfig {
    /// Raw embeddings and projected coordinates. Required.
    pub repo: Arc<dyn VectorRepository>,

    /// Serialized projection models. Required.
    pub models: Arc<dyn ModelStore>,

    /// Turns source references and text into vectors. Required.
    pub encoder: Arc<dyn Encoder>,

    /// Projector settings. `dim` must equal the encoder dimension.
    pub projector: ProjectorConfig,

    pub pipeline: PipelineConfig,
}

impl ServiceConfig {
    /// Config with default projector and pipeline settings; the projector
    /// dimension follows the encoder.
    pub fn new(
        repo: Arc<dyn VectorRepository>,
        models: Arc<dyn ModelStore>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        let projector = ProjectorConfig {
            dim: encoder.dimension(),
            ..ProjectorConfig::default()
        };
        Self {
            repo,
            models,
            encoder,
            projector,
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Process-level entry point: batch ingestion, similarity queries and
/// read access to projections, for many projects sharing one repository,
/// model store and encoder. Safe for concurrent use.
pub struct Service {
    pipeline: ProjectionPipeline,
    search: SimilaritySearchEngine,
    encoder: Arc<dyn Encoder>,
    cfg: PipelineConfig,
}

impl Service {
    /// Create a new Service. Fails if the encoder and projector disagree on
    /// the embedding dimension.
    pub fn new(cfg: ServiceConfig) -> Result<Self, PipelineError> {
        if cfg.projector.dim == 0 || cfg.projector.max_components == 0 {
            return Err(PipelineError::Validation(format!(
                "projector needs positive dim and max_components, got {:?}",
                cfg.projector
            )));
        }
        if cfg.encoder.dimension() != cfg.projector.dim {
            return Err(PipelineError::DimensionMismatch {
                got: cfg.encoder.dimension(),
                want: cfg.projector.dim,
            });
        }

        let projector = IncrementalProjector::new(cfg.projector, cfg.models);
        let search = SimilaritySearchEngine::new(Arc::clone(&cfg.repo), cfg.projector.dim);
        let pipeline =
            ProjectionPipeline::new(cfg.repo, Arc::clone(&cfg.encoder), projector, cfg.pipeline);
        Ok(Self {
            pipeline,
            search,
            encoder: cfg.encoder,
            cfg: cfg.pipeline,
        })
    }

    pub fn pipeline(&self) -> &ProjectionPipeline {
        &self.pipeline
    }

    /// Validate and run a batch ingestion.
    pub async fn ingest(&self, req: &IngestRequest) -> Result<IngestResponse, PipelineError> {
        req.validate()?;
        let processed = self.pipeline.run(&req.project_id, &req.items).await?;
        Ok(IngestResponse { processed })
    }

    /// Encode the query payload and rank the project's stored points.
    pub async fn query(&self, req: &QueryRequest) -> Result<Vec<QueryResult>, PipelineError> {
        req.validate()?;
        let source = req.source();
        let vector = tokio::time::timeout(self.cfg.encode_timeout, self.encoder.encode(&source))
            .await
            .map_err(|_| {
                PipelineError::ExternalFetch(format!(
                    "query encode timed out after {:?}",
                    self.cfg.encode_timeout
                ))
            })??;
        debug!("pipeline: query {} ({:?})", req.project_id, req.mode);
        Ok(self.search.query(&req.project_id, &vector, req.top_k)?)
    }

    /// Projected points of a project for plotting.
    pub fn points(&self, project_id: &str) -> Result<Vec<PlotPoint>, PipelineError> {
        self.pipeline.points(project_id)
    }

    /// Summary of the project's current projection model, if any.
    pub fn model(&self, project_id: &str) -> Result<Option<ModelSummary>, PipelineError> {
        let model = self.pipeline.projector().load(project_id)?;
        Ok(model.as_ref().map(ModelSummary::from))
    }
}
