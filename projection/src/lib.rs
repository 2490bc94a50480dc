//! Incremental principal-component projection.
//!
//! [`IncrementalProjector`] fits a [`ProjectionModel`] on a first batch of
//! embeddings and folds later batches into it without replaying history.
//! The number of output components is fixed by the first fit.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use photograph_projection::{IncrementalProjector, ProjectorConfig};
//! use photograph_store::MemoryStore;
//!
//! let projector = IncrementalProjector::new(
//!     ProjectorConfig { dim: 3, max_components: 2 },
//!     Arc::new(MemoryStore::new()),
//! );
//! let model = projector
//!     .fit(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]])
//!     .unwrap();
//! let model = projector.update(&model, &[vec![1.0, 1.0, 0.0]]).unwrap();
//! assert_eq!(model.k, 2);
//! assert_eq!(model.n, 4);
//!
//! let coords = projector.transform(&model, &[vec![0.5, 0.5, 0.0]]).unwrap();
//! assert_eq!(coords[0].len(), 2);
//! ```

mod error;
mod linalg;
mod model;
mod projector;

pub use error::ProjectionError;
pub use model::{MODEL_FORMAT_VERSION, ProjectionModel};
pub use projector::{
    DEFAULT_DIM, DEFAULT_MAX_COMPONENTS, IncrementalProjector, ProjectorConfig,
};
