use std::sync::Arc;

use photograph_store::ModelStore;
use tracing::{debug, warn};

use crate::error::ProjectionError;
use crate::linalg::top_components;
use crate::model::ProjectionModel;

/// Default embedding dimension (CLIP ViT-B/32).
pub const DEFAULT_DIM: usize = 512;

/// Default cap on output components (enough for 2D and 3D plots).
pub const DEFAULT_MAX_COMPONENTS: usize = 3;

/// Controls projector behavior.
#[derive(Debug, Clone, Copy)]
pub struct ProjectorConfig {
    /// Embedding dimension D.
    pub dim: usize,

    /// Upper bound on the number of components chosen at first fit.
    pub max_components: usize,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            max_components: DEFAULT_MAX_COMPONENTS,
        }
    }
}

/// Fits, updates and applies per-project projection models.
///
/// The projector itself is stateless apart from its configuration and the
/// injected [`ModelStore`]; callers serialize `load → update → save` per
/// project.
pub struct IncrementalProjector {
    cfg: ProjectorConfig,
    store: Arc<dyn ModelStore>,
}

impl IncrementalProjector {
    /// Creates a new projector. Panics if `dim` or `max_components` is 0.
    pub fn new(cfg: ProjectorConfig, store: Arc<dyn ModelStore>) -> Self {
        assert!(cfg.dim > 0, "projection: ProjectorConfig.dim must be positive");
        assert!(
            cfg.max_components > 0,
            "projection: ProjectorConfig.max_components must be positive"
        );
        Self { cfg, store }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.cfg
    }

    /// Returns the stored model of a project.
    ///
    /// A missing, undecodable, or foreign-dimension blob yields `Ok(None)`.
    /// A store read failure is returned as [`ProjectionError::Persist`].
    pub fn load(&self, project_id: &str) -> Result<Option<ProjectionModel>, ProjectionError> {
        let Some(data) = self.store.load_model(project_id)? else {
            return Ok(None);
        };
        match ProjectionModel::from_bytes(&data) {
            Ok(model) if model.dim() == self.cfg.dim => Ok(Some(model)),
            Ok(model) => {
                warn!(
                    "projection: model for {project_id} has dim {}, want {}; ignoring",
                    model.dim(),
                    self.cfg.dim
                );
                Ok(None)
            }
            Err(e) => {
                warn!("projection: {e} (project {project_id}); ignoring");
                Ok(None)
            }
        }
    }

    /// Fits a new model on `vectors`.
    ///
    /// k = min(samples, max_components, D).
    pub fn fit(&self, vectors: &[Vec<f32>]) -> Result<ProjectionModel, ProjectionError> {
        if vectors.is_empty() {
            return Err(ProjectionError::EmptyInput);
        }
        self.check_dims(vectors)?;

        let dim = self.cfg.dim;
        let k = vectors.len().min(self.cfg.max_components).min(dim);
        let mean = column_mean(vectors, dim);
        let rows: Vec<Vec<f64>> = vectors.iter().map(|v| centered(v, &mean)).collect();

        let top = top_components(&rows, k, dim);
        debug!("projection: fit n={} k={k}", vectors.len());
        Ok(ProjectionModel {
            mean,
            basis: top.vectors,
            singular_values: top.values,
            k,
            n: vectors.len() as u64,
        })
    }

    /// Folds `new_vectors` into `model` without revisiting earlier samples.
    ///
    /// The old basis (scaled by its singular values), a mean-shift
    /// correction row and the centered new samples are stacked, and the top
    /// k directions of that stack become the new basis. An empty batch
    /// returns the model unchanged.
    pub fn update(
        &self,
        model: &ProjectionModel,
        new_vectors: &[Vec<f32>],
    ) -> Result<ProjectionModel, ProjectionError> {
        if new_vectors.is_empty() {
            return Ok(model.clone());
        }
        if model.n == 0 {
            return self.fit(new_vectors);
        }
        model.check_shape()?;
        if model.dim() != self.cfg.dim {
            return Err(ProjectionError::DimensionMismatch {
                got: model.dim(),
                want: self.cfg.dim,
            });
        }
        self.check_dims(new_vectors)?;

        let dim = self.cfg.dim;
        let k = model.k;
        let n_old = model.n as f64;
        let m = new_vectors.len() as f64;
        let n_total = n_old + m;

        let batch_mean = column_mean(new_vectors, dim);
        let mean: Vec<f64> = model
            .mean
            .iter()
            .zip(&batch_mean)
            .map(|(old, new)| (n_old * old + m * new) / n_total)
            .collect();

        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(k + new_vectors.len() + 1);
        for (row, &s) in model.basis.iter().zip(&model.singular_values) {
            rows.push(row.iter().map(|x| x * s).collect());
        }
        for v in new_vectors {
            rows.push(centered(v, &batch_mean));
        }
        let scale = (n_old * m / n_total).sqrt();
        rows.push(
            model
                .mean
                .iter()
                .zip(&batch_mean)
                .map(|(old, new)| scale * (old - new))
                .collect(),
        );

        let top = top_components(&rows, k, dim);
        debug!(
            "projection: update n={}+{} k={k}",
            model.n,
            new_vectors.len()
        );
        Ok(ProjectionModel {
            mean,
            basis: top.vectors,
            singular_values: top.values,
            k,
            n: model.n + new_vectors.len() as u64,
        })
    }

    /// Projects every vector onto the model's basis; one k-length
    /// coordinate per input.
    pub fn transform(
        &self,
        model: &ProjectionModel,
        vectors: &[Vec<f32>],
    ) -> Result<Vec<Vec<f32>>, ProjectionError> {
        vectors.iter().map(|v| model.project(v)).collect()
    }

    /// Persists the model, replacing any earlier one for the project.
    pub fn save(&self, project_id: &str, model: &ProjectionModel) -> Result<(), ProjectionError> {
        let data = model.to_bytes()?;
        self.store.save_model(project_id, &data)?;
        debug!(
            "projection: saved model for {project_id} (k={}, n={}, {} bytes)",
            model.k,
            model.n,
            data.len()
        );
        Ok(())
    }

    fn check_dims(&self, vectors: &[Vec<f32>]) -> Result<(), ProjectionError> {
        match vectors.iter().find(|v| v.len() != self.cfg.dim) {
            Some(v) => Err(ProjectionError::DimensionMismatch {
                got: v.len(),
                want: self.cfg.dim,
            }),
            None => Ok(()),
        }
    }
}

fn column_mean(vectors: &[Vec<f32>], dim: usize) -> Vec<f64> {
    let mut mean = vec![0.0f64; dim];
    for v in vectors {
        for (m, &x) in mean.iter_mut().zip(v) {
            *m += x as f64;
        }
    }
    let n = vectors.len() as f64;
    for m in mean.iter_mut() {
        *m /= n;
    }
    mean
}

fn centered(v: &[f32], mean: &[f64]) -> Vec<f64> {
    v.iter().zip(mean).map(|(&x, m)| x as f64 - m).collect()
}
