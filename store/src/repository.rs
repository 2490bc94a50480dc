use std::fmt;

use crate::error::StoreError;
use crate::types::{ProjectedPoint, StoredEmbedding};

/// VectorRepository stores raw embeddings and projected coordinates keyed
/// by project and data point id.
///
/// Writes for distinct data point ids never conflict, and re-writing the
/// same record is idempotent. Implementations must be safe for concurrent
/// use (Send + Sync).
pub trait VectorRepository: Send + Sync {
    /// Insert or replace the embedding of `record.point`.
    fn put_embedding(&self, record: &StoredEmbedding) -> Result<(), StoreError>;

    /// Return every embedding stored for the project, in a stable
    /// retrieval order.
    fn embeddings(&self, project_id: &str) -> Result<Vec<StoredEmbedding>, StoreError>;

    /// Insert or replace the projected coordinates of many points at once.
    fn put_projections(
        &self,
        project_id: &str,
        points: &[ProjectedPoint],
    ) -> Result<(), StoreError>;

    /// Return every projected point stored for the project.
    fn projections(&self, project_id: &str) -> Result<Vec<ProjectedPoint>, StoreError>;
}

/// ModelStore persists one opaque serialized projection model per project.
pub trait ModelStore: Send + Sync {
    /// Return the stored blob, or None if the project has no model.
    fn load_model(&self, project_id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store the blob, overwriting any previous model of the project.
    fn save_model(&self, project_id: &str, blob: &[u8]) -> Result<(), StoreError>;
}

impl fmt::Debug for dyn VectorRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VectorRepository {{ ... }}")
    }
}

impl fmt::Debug for dyn ModelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelStore {{ ... }}")
    }
}
