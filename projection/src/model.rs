use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;

/// Version tag written into every serialized model.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// ProjectionModel is the fitted state of one project's projector.
///
/// `basis` holds `k` orthonormal rows of length D, ordered by decreasing
/// singular value. `k` is fixed by the first fit; `n` only grows.
#[derive(Clone, PartialEq)]
pub struct ProjectionModel {
    /// Mean of every sample seen so far (length D).
    pub mean: Vec<f64>,

    /// Principal directions, `k` rows × D columns.
    pub basis: Vec<Vec<f64>>,

    /// Singular value associated with each basis row.
    pub singular_values: Vec<f64>,

    /// Output dimensionality.
    pub k: usize,

    /// Number of samples folded into the model.
    pub n: u64,
}

impl fmt::Debug for ProjectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionModel")
            .field("dim", &self.dim())
            .field("k", &self.k)
            .field("n", &self.n)
            .field("singular_values", &self.singular_values)
            .finish()
    }
}

#[derive(Serialize)]
struct BlobRef<'a> {
    version: u32,
    mean: &'a [f64],
    basis: &'a [Vec<f64>],
    singular_values: &'a [f64],
    k: usize,
    n: u64,
}

#[derive(Deserialize)]
struct Blob {
    version: u32,
    mean: Vec<f64>,
    basis: Vec<Vec<f64>>,
    singular_values: Vec<f64>,
    k: usize,
    n: u64,
}

impl ProjectionModel {
    /// Input dimensionality D.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Variance explained by each component: σᵢ² / (n − 1).
    pub fn explained_variance(&self) -> Vec<f64> {
        if self.n <= 1 {
            return vec![0.0; self.k];
        }
        let denom = (self.n - 1) as f64;
        self.singular_values.iter().map(|s| s * s / denom).collect()
    }

    /// Project one vector onto the basis: `(v − mean) · basisᵗ`.
    pub fn project(&self, v: &[f32]) -> Result<Vec<f32>, ProjectionError> {
        if v.len() != self.dim() {
            return Err(ProjectionError::DimensionMismatch {
                got: v.len(),
                want: self.dim(),
            });
        }
        Ok(self
            .basis
            .iter()
            .map(|row| {
                row.iter()
                    .zip(v.iter().zip(&self.mean))
                    .map(|(b, (&x, m))| (x as f64 - m) * b)
                    .sum::<f64>() as f32
            })
            .collect())
    }

    /// Serialize to the persisted blob format (MessagePack).
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProjectionError> {
        let blob = BlobRef {
            version: MODEL_FORMAT_VERSION,
            mean: &self.mean,
            basis: &self.basis,
            singular_values: &self.singular_values,
            k: self.k,
            n: self.n,
        };
        rmp_serde::to_vec_named(&blob).map_err(|e| ProjectionError::ModelCorrupt(e.to_string()))
    }

    /// Deserialize a blob written by [`ProjectionModel::to_bytes`] and check
    /// its shape.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProjectionError> {
        let blob: Blob = rmp_serde::from_slice(data)
            .map_err(|e| ProjectionError::ModelCorrupt(e.to_string()))?;
        if blob.version != MODEL_FORMAT_VERSION {
            return Err(ProjectionError::ModelCorrupt(format!(
                "unsupported version {}",
                blob.version
            )));
        }
        let model = Self {
            mean: blob.mean,
            basis: blob.basis,
            singular_values: blob.singular_values,
            k: blob.k,
            n: blob.n,
        };
        model.check_shape()?;
        Ok(model)
    }

    pub(crate) fn check_shape(&self) -> Result<(), ProjectionError> {
        let corrupt = |msg: String| Err(ProjectionError::ModelCorrupt(msg));
        if self.k == 0 || self.n == 0 || self.mean.is_empty() {
            return corrupt(format!(
                "empty model: k={}, n={}, dim={}",
                self.k,
                self.n,
                self.dim()
            ));
        }
        if self.basis.len() != self.k || self.singular_values.len() != self.k {
            return corrupt(format!(
                "k={} but {} basis rows and {} singular values",
                self.k,
                self.basis.len(),
                self.singular_values.len()
            ));
        }
        if let Some(row) = self.basis.iter().find(|r| r.len() != self.dim()) {
            return corrupt(format!(
                "basis row of length {}, want {}",
                row.len(),
                self.dim()
            ));
        }
        Ok(())
    }
}
