//! Persistence contracts for the projection and search engines.
//!
//! Provides the [`VectorRepository`] and [`ModelStore`] traits with an
//! in-memory implementation for testing and a redb-based implementation
//! for persistence.

pub mod error;
pub mod keys;
pub mod memory;
pub mod redb;
pub mod repository;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use redb::RedbStore;
pub use repository::{ModelStore, VectorRepository};
pub use types::{DataPoint, ProjectedPoint, RawVector, StoredEmbedding};
