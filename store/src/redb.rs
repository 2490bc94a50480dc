//! Redb-based persistent store implementation.

use std::path::Path;

use redb::{Database, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StoreError, storage};
use crate::keys::{point_key, project_prefix};
use crate::repository::{ModelStore, VectorRepository};
use crate::types::{ProjectedPoint, StoredEmbedding};

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

const EMBEDDINGS: Table = TableDefinition::new("embeddings");
const PROJECTIONS: Table = TableDefinition::new("projections");
const MODELS: Table = TableDefinition::new("models");

/// A persistent [`VectorRepository`] and [`ModelStore`] backed by redb.
///
/// Records are MessagePack-encoded. Embeddings and projections are keyed
/// by `{project}\x1F{point}`, so a project's records are returned in
/// point-id order.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(storage)?;

        // Create the tables if they don't exist
        let tx = db.begin_write().map_err(storage)?;
        {
            tx.open_table(EMBEDDINGS).map_err(storage)?;
            tx.open_table(PROJECTIONS).map_err(storage)?;
            tx.open_table(MODELS).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;

        Ok(Self { db })
    }

    fn put_many(
        &self,
        table: Table,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), StoreError> {
        let tx = self.db.begin_write().map_err(storage)?;
        {
            let mut t = tx.open_table(table).map_err(storage)?;
            for (key, value) in entries {
                t.insert(key.as_str(), value.as_slice()).map_err(storage)?;
            }
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(
        &self,
        table: Table,
        prefix: &str,
    ) -> Result<Vec<T>, StoreError> {
        let tx = self.db.begin_read().map_err(storage)?;
        let t = tx.open_table(table).map_err(storage)?;

        let mut results = Vec::new();
        for item in t.range(prefix..).map_err(storage)? {
            let (key, value) = item.map_err(storage)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            results.push(decode(value.value())?);
        }
        Ok(results)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    rmp_serde::to_vec_named(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, StoreError> {
    rmp_serde::from_slice(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl VectorRepository for RedbStore {
    fn put_embedding(&self, record: &StoredEmbedding) -> Result<(), StoreError> {
        let key = point_key(&record.point.project_id, &record.point.id)?;
        self.put_many(EMBEDDINGS, &[(key, encode(record)?)])
    }

    fn embeddings(&self, project_id: &str) -> Result<Vec<StoredEmbedding>, StoreError> {
        self.scan(EMBEDDINGS, &project_prefix(project_id)?)
    }

    fn put_projections(
        &self,
        project_id: &str,
        points: &[ProjectedPoint],
    ) -> Result<(), StoreError> {
        let entries = points
            .iter()
            .map(|p| Ok((point_key(project_id, &p.data_point_id)?, encode(p)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        // One transaction, so a project's coordinates are replaced together.
        self.put_many(PROJECTIONS, &entries)
    }

    fn projections(&self, project_id: &str) -> Result<Vec<ProjectedPoint>, StoreError> {
        self.scan(PROJECTIONS, &project_prefix(project_id)?)
    }
}

impl ModelStore for RedbStore {
    fn load_model(&self, project_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let tx = self.db.begin_read().map_err(storage)?;
        let t = tx.open_table(MODELS).map_err(storage)?;
        match t.get(project_id).map_err(storage)? {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn save_model(&self, project_id: &str, blob: &[u8]) -> Result<(), StoreError> {
        project_prefix(project_id)?;
        self.put_many(MODELS, &[(project_id.to_string(), blob.to_vec())])
    }
}
