//! In-memory store implementation for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{StoreError, storage};
use crate::keys::{point_key, project_prefix};
use crate::repository::{ModelStore, VectorRepository};
use crate::types::{ProjectedPoint, StoredEmbedding};

/// An in-memory [`VectorRepository`] and [`ModelStore`].
///
/// Embeddings are returned in first-insertion order; replacing an existing
/// point keeps its position. Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    embeddings: HashMap<String, Vec<StoredEmbedding>>,
    projections: HashMap<String, Vec<ProjectedPoint>>,
    models: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(storage)
    }
}

impl VectorRepository for MemoryStore {
    fn put_embedding(&self, record: &StoredEmbedding) -> Result<(), StoreError> {
        point_key(&record.point.project_id, &record.point.id)?;
        let mut inner = self.lock()?;
        let list = inner
            .embeddings
            .entry(record.point.project_id.clone())
            .or_default();
        match list.iter_mut().find(|e| e.point.id == record.point.id) {
            Some(existing) => *existing = record.clone(),
            None => list.push(record.clone()),
        }
        Ok(())
    }

    fn embeddings(&self, project_id: &str) -> Result<Vec<StoredEmbedding>, StoreError> {
        project_prefix(project_id)?;
        let inner = self.lock()?;
        Ok(inner.embeddings.get(project_id).cloned().unwrap_or_default())
    }

    fn put_projections(
        &self,
        project_id: &str,
        points: &[ProjectedPoint],
    ) -> Result<(), StoreError> {
        for p in points {
            point_key(project_id, &p.data_point_id)?;
        }
        let mut inner = self.lock()?;
        let list = inner.projections.entry(project_id.to_string()).or_default();
        for p in points {
            match list.iter_mut().find(|e| e.data_point_id == p.data_point_id) {
                Some(existing) => existing.coords = p.coords.clone(),
                None => list.push(p.clone()),
            }
        }
        Ok(())
    }

    fn projections(&self, project_id: &str) -> Result<Vec<ProjectedPoint>, StoreError> {
        project_prefix(project_id)?;
        let inner = self.lock()?;
        Ok(inner.projections.get(project_id).cloned().unwrap_or_default())
    }
}

impl ModelStore for MemoryStore {
    fn load_model(&self, project_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.models.get(project_id).cloned())
    }

    fn save_model(&self, project_id: &str, blob: &[u8]) -> Result<(), StoreError> {
        project_prefix(project_id)?;
        let mut inner = self.lock()?;
        inner.models.insert(project_id.to_string(), blob.to_vec());
        Ok(())
    }
}
