use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use photograph_embed::{Encoder, Source};
use photograph_projection::{IncrementalProjector, ProjectionModel};
use photograph_store::{DataPoint, ProjectedPoint, StoredEmbedding, VectorRepository};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::locks::ProjectLocks;
use crate::types::{IngestItem, PlotPoint};

/// Default bound on a single encoder call.
pub const DEFAULT_ENCODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of encoder calls in flight per run.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Controls batch ingestion.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Per-item encoder timeout. A timed-out item is skipped.
    pub encode_timeout: Duration,

    /// Maximum concurrent encoder calls within one run.
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            encode_timeout: DEFAULT_ENCODE_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// ProjectionPipeline embeds incoming items, folds them into the project's
/// projection model and re-projects every stored point of the project.
///
/// Encoding runs without any lock. Loading, updating and saving the model
/// and rewriting the coordinates run under a per-project lock, so
/// concurrent runs for one project never lose each other's updates.
pub struct ProjectionPipeline {
    repo: Arc<dyn VectorRepository>,
    encoder: Arc<dyn Encoder>,
    projector: IncrementalProjector,
    locks: ProjectLocks,
    cfg: PipelineConfig,
}

impl ProjectionPipeline {
    pub fn new(
        repo: Arc<dyn VectorRepository>,
        encoder: Arc<dyn Encoder>,
        projector: IncrementalProjector,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            repo,
            encoder,
            projector,
            locks: ProjectLocks::new(),
            cfg,
        }
    }

    pub fn projector(&self) -> &IncrementalProjector {
        &self.projector
    }

    /// Ingest `items` into `project_id` and refresh its projection.
    ///
    /// Returns the number of items that were embedded and stored. Items
    /// that fail to encode, time out, or fail to persist are logged and
    /// skipped.
    pub async fn run(&self, project_id: &str, items: &[IngestItem]) -> Result<usize, PipelineError> {
        let new_vectors = self.embed_all(project_id, items).await;
        debug!(
            "pipeline: {project_id}: embedded {}/{} items",
            new_vectors.len(),
            items.len()
        );

        let _guard = self.locks.lock(project_id).await;
        self.refresh(project_id, &new_vectors)?;

        info!(
            "pipeline: {project_id}: processed {} of {} items",
            new_vectors.len(),
            items.len()
        );
        Ok(new_vectors.len())
    }

    /// Every projected point of the project with its label and source
    /// reference, in repository order. Points without coordinates are
    /// omitted.
    pub fn points(&self, project_id: &str) -> Result<Vec<PlotPoint>, PipelineError> {
        let mut coords: HashMap<String, Vec<f32>> = self
            .repo
            .projections(project_id)?
            .into_iter()
            .map(|p| (p.data_point_id, p.coords))
            .collect();

        Ok(self
            .repo
            .embeddings(project_id)?
            .into_iter()
            .filter_map(|rec| {
                let coords = coords.remove(&rec.point.id)?;
                Some(PlotPoint {
                    data_point_id: rec.point.id,
                    label: rec.point.label,
                    source_ref: rec.point.source_ref,
                    coords,
                })
            })
            .collect())
    }

    async fn embed_all(&self, project_id: &str, items: &[IngestItem]) -> Vec<Vec<f32>> {
        let calls: Vec<_> = items
            .iter()
            .map(|item| self.embed_one(project_id, item))
            .collect();
        let results: Vec<Option<Vec<f32>>> = stream::iter(calls)
            .buffered(self.cfg.max_concurrency.max(1))
            .collect()
            .await;
        results.into_iter().flatten().collect()
    }

    async fn embed_one(&self, project_id: &str, item: &IngestItem) -> Option<Vec<f32>> {
        let source = Source::Ref(item.source_ref.clone());
        let vector =
            match tokio::time::timeout(self.cfg.encode_timeout, self.encoder.encode(&source)).await
            {
                Ok(Ok(v)) => v,
                Ok(Err(e)) => {
                    warn!("pipeline: {project_id}/{}: {e}", item.data_point_id);
                    return None;
                }
                Err(_) => {
                    warn!(
                        "pipeline: {project_id}/{}: encode timed out after {:?}",
                        item.data_point_id, self.cfg.encode_timeout
                    );
                    return None;
                }
            };

        let want = self.projector.config().dim;
        if vector.len() != want {
            warn!(
                "pipeline: {project_id}/{}: encoder returned {} values, want {want}",
                item.data_point_id,
                vector.len()
            );
            return None;
        }

        let record = StoredEmbedding::new(
            DataPoint {
                id: item.data_point_id.clone(),
                project_id: project_id.to_string(),
                label: item.label().to_string(),
                source_ref: item.source_ref.clone(),
            },
            vector.clone(),
        );
        if let Err(e) = self.repo.put_embedding(&record) {
            warn!("pipeline: {project_id}/{}: {e}", item.data_point_id);
            return None;
        }
        Some(vector)
    }

    /// Fold `new_vectors` into the model and re-project every stored point.
    /// Caller must hold the project lock.
    ///
    /// Every coordinate is computed before anything is written, so a failed
    /// run leaves the previous model and coordinates in place.
    fn refresh(
        &self,
        project_id: &str,
        new_vectors: &[Vec<f32>],
    ) -> Result<Option<ProjectionModel>, PipelineError> {
        let prior = self.projector.load(project_id)?;
        let (model, changed) = match prior {
            None if new_vectors.is_empty() => {
                debug!("pipeline: {project_id}: nothing to fit");
                return Ok(None);
            }
            Some(model) if new_vectors.is_empty() => (model, false),
            None => (self.projector.fit(new_vectors)?, true),
            Some(prior) => (self.projector.update(&prior, new_vectors)?, true),
        };

        let points = self.project_all(project_id, &model)?;
        if changed {
            self.projector.save(project_id, &model)?;
            info!("pipeline: {project_id}: saved model k={} n={}", model.k, model.n);
        }
        self.repo.put_projections(project_id, &points)?;
        debug!("pipeline: {project_id}: re-projected {} points", points.len());
        Ok(Some(model))
    }

    fn project_all(
        &self,
        project_id: &str,
        model: &ProjectionModel,
    ) -> Result<Vec<ProjectedPoint>, PipelineError> {
        let stored = self.repo.embeddings(project_id)?;
        if stored.is_empty() {
            return Err(PipelineError::NoEmbeddings(project_id.to_string()));
        }

        let mut ids = Vec::with_capacity(stored.len());
        let mut vectors = Vec::with_capacity(stored.len());
        for rec in &stored {
            vectors.push(rec.vector()?);
            ids.push(rec.point.id.clone());
        }

        let coords = self.projector.transform(model, &vectors)?;
        Ok(ids
            .into_iter()
            .zip(coords)
            .map(|(data_point_id, coords)| ProjectedPoint {
                data_point_id,
                coords,
            })
            .collect())
    }
}
