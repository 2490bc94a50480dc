use serde::{Deserialize, Serialize};

use crate::error::EncodeError;

/// Source is the input handed to an encoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Source {
    /// Free text.
    Text(String),
    /// Reference to a source item, e.g. an image URL.
    Ref(String),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Source::Text(s) | Source::Ref(s) => s,
        }
    }
}

/// Encoder converts images and text into dense float32 vectors of a fixed
/// dimension.
///
/// Implementations must be safe for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait Encoder: Send + Sync {
    /// Return the embedding vector for a single source.
    async fn encode(&self, source: &Source) -> Result<Vec<f32>, EncodeError>;

    /// Return the dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}

/// Scale `v` to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let s = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= s;
        }
    }
}
