use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// DataPoint is a single item of a project (typically one image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Unique identifier within the project.
    #[serde(rename = "id")]
    pub id: String,

    /// Owning project.
    #[serde(rename = "project_id")]
    pub project_id: String,

    /// Human-readable label (e.g. the uploaded file name).
    #[serde(rename = "label", default)]
    pub label: String,

    /// Locator of the source item (e.g. an image URL).
    #[serde(rename = "source_ref", default)]
    pub source_ref: String,
}

/// RawVector is an embedding as it may appear in storage: either a native
/// numeric sequence or its JSON text encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawVector {
    Numbers(Vec<f32>),
    Text(String),
}

impl RawVector {
    /// Normalize to numeric form. `id` is only used in the error message.
    pub fn to_vec(&self, id: &str) -> Result<Vec<f32>, StoreError> {
        match self {
            RawVector::Numbers(v) => Ok(v.clone()),
            RawVector::Text(s) => {
                serde_json::from_str::<Vec<f32>>(s).map_err(|e| StoreError::MalformedVector {
                    id: id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl From<Vec<f32>> for RawVector {
    fn from(v: Vec<f32>) -> Self {
        RawVector::Numbers(v)
    }
}

/// StoredEmbedding pairs a data point with its raw embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    #[serde(rename = "point")]
    pub point: DataPoint,

    #[serde(rename = "vector")]
    pub vector: RawVector,
}

impl StoredEmbedding {
    pub fn new(point: DataPoint, vector: impl Into<RawVector>) -> Self {
        Self {
            point,
            vector: vector.into(),
        }
    }

    /// Return the embedding in numeric form.
    pub fn vector(&self) -> Result<Vec<f32>, StoreError> {
        self.vector.to_vec(&self.point.id)
    }
}

/// ProjectedPoint is the low-dimensional coordinate of a data point under
/// the project's current projection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    #[serde(rename = "data_point_id")]
    pub data_point_id: String,

    #[serde(rename = "coords")]
    pub coords: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_pass_through() {
        let v = RawVector::Numbers(vec![1.0, 2.5]);
        assert_eq!(v.to_vec("a").unwrap(), vec![1.0, 2.5]);
    }

    #[test]
    fn json_text_is_parsed() {
        let v = RawVector::Text("[0.5, -1, 3e-1]".into());
        assert_eq!(v.to_vec("a").unwrap(), vec![0.5, -1.0, 0.3]);
    }

    #[test]
    fn malformed_text_names_the_point() {
        let v = RawVector::Text("[0.5, oops]".into());
        match v.to_vec("p7") {
            Err(StoreError::MalformedVector { id, .. }) => assert_eq!(id, "p7"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn untagged_json_accepts_both_forms() {
        let native: RawVector = serde_json::from_str("[1.0, 2.0]").unwrap();
        assert_eq!(native, RawVector::Numbers(vec![1.0, 2.0]));

        let text: RawVector = serde_json::from_str("\"[1.0, 2.0]\"").unwrap();
        assert_eq!(text.to_vec("x").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn msgpack_keeps_text_form() {
        let rec = StoredEmbedding::new(
            DataPoint {
                id: "a".into(),
                project_id: "p".into(),
                label: "cat.png".into(),
                source_ref: "https://img/cat.png".into(),
            },
            RawVector::Text("[1, 0]".into()),
        );
        let data = rmp_serde::to_vec_named(&rec).unwrap();
        let back: StoredEmbedding = rmp_serde::from_slice(&data).unwrap();
        assert_eq!(back, rec);
        assert_eq!(back.vector().unwrap(), vec![1.0, 0.0]);
    }
}
