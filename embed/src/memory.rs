use std::collections::HashMap;
use std::sync::RwLock;

use crate::encoder::{Encoder, Source};
use crate::error::EncodeError;

/// MemoryEncoder is an in-memory Encoder backed by a lookup table.
/// Intended for testing and offline use with precomputed vectors.
pub struct MemoryEncoder {
    dim: usize,
    vectors: RwLock<HashMap<Source, Vec<f32>>>,
}

impl MemoryEncoder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    /// Register the vector returned for `source`.
    pub fn insert(&self, source: Source, vector: Vec<f32>) {
        self.vectors.write().unwrap().insert(source, vector);
    }

    /// Builder form of [`MemoryEncoder::insert`].
    pub fn with(self, source: Source, vector: Vec<f32>) -> Self {
        self.insert(source, vector);
        self
    }
}

#[async_trait::async_trait]
impl Encoder for MemoryEncoder {
    async fn encode(&self, source: &Source) -> Result<Vec<f32>, EncodeError> {
        if source.as_str().is_empty() {
            return Err(EncodeError::EmptyInput);
        }
        self.vectors
            .read()
            .unwrap()
            .get(source)
            .cloned()
            .ok_or_else(|| EncodeError::UnknownSource(source.as_str().to_string()))
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
