use std::collections::HashSet;

use photograph_embed::Source;
use photograph_projection::ProjectionModel;
use photograph_store::keys::point_key;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Default number of query results.
pub const DEFAULT_TOP_K: usize = 5;

/// One item of a batch ingestion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestItem {
    #[serde(default)]
    pub data_point_id: String,

    /// Locator handed to the encoder (e.g. an image URL).
    #[serde(default)]
    pub source_ref: String,

    /// Display label; defaults to `source_ref`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl IngestItem {
    pub fn new(data_point_id: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            data_point_id: data_point_id.into(),
            source_ref: source_ref.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The label to store: the explicit one, or the source reference.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.source_ref)
    }
}

/// Batch ingestion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub items: Vec<IngestItem>,
}

impl IngestRequest {
    /// Parse and validate a JSON request body.
    pub fn from_json(data: &[u8]) -> Result<Self, PipelineError> {
        let req: Self =
            serde_json::from_slice(data).map_err(|e| PipelineError::Validation(e.to_string()))?;
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.project_id.trim().is_empty() {
            return Err(PipelineError::Validation("project_id is required".into()));
        }
        if self.items.is_empty() {
            return Err(PipelineError::Validation("items must not be empty".into()));
        }
        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if item.data_point_id.is_empty() {
                return Err(PipelineError::Validation("item without data_point_id".into()));
            }
            if item.source_ref.trim().is_empty() {
                return Err(PipelineError::Validation(format!(
                    "item {} has no source_ref",
                    item.data_point_id
                )));
            }
            point_key(&self.project_id, &item.data_point_id)
                .map_err(|e| PipelineError::Validation(e.to_string()))?;
            if !seen.insert(item.data_point_id.as_str()) {
                return Err(PipelineError::Validation(format!(
                    "duplicate data_point_id {}",
                    item.data_point_id
                )));
            }
        }
        Ok(())
    }
}

/// Batch ingestion response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Items embedded and folded into the model by this run.
    pub processed: usize,
}

/// How a query payload is turned into a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryMode {
    /// The payload is free text.
    #[serde(rename = "text")]
    Text,

    /// The payload is a source reference (e.g. an image URL).
    #[serde(rename = "vector-source")]
    VectorSource,
}

/// Similarity query request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub project_id: String,

    pub mode: QueryMode,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub query_payload: String,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl QueryRequest {
    pub fn new(project_id: impl Into<String>, mode: QueryMode, payload: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            mode,
            top_k: DEFAULT_TOP_K,
            query_payload: payload.into(),
        }
    }

    /// Parse and validate a JSON request body.
    pub fn from_json(data: &[u8]) -> Result<Self, PipelineError> {
        let req: Self =
            serde_json::from_slice(data).map_err(|e| PipelineError::Validation(e.to_string()))?;
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.project_id.trim().is_empty() {
            return Err(PipelineError::Validation("project_id is required".into()));
        }
        if self.top_k == 0 {
            return Err(PipelineError::Validation("top_k must be at least 1".into()));
        }
        if self.query_payload.trim().is_empty() {
            return Err(PipelineError::Validation("query_payload is required".into()));
        }
        Ok(())
    }

    /// The encoder input for this query.
    pub fn source(&self) -> Source {
        match self.mode {
            QueryMode::Text => Source::Text(self.query_payload.clone()),
            QueryMode::VectorSource => Source::Ref(self.query_payload.clone()),
        }
    }
}

/// A projected point joined with its data point, ready for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub data_point_id: String,
    pub label: String,
    pub source_ref: String,
    pub coords: Vec<f32>,
}

/// Serializable view of a project's projection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub dim: usize,
    pub k: usize,
    pub n: u64,
    pub singular_values: Vec<f64>,
    pub explained_variance: Vec<f64>,
}

impl From<&ProjectionModel> for ModelSummary {
    fn from(m: &ProjectionModel) -> Self {
        Self {
            dim: m.dim(),
            k: m.k,
            n: m.n,
            singular_values: m.singular_values.clone(),
            explained_variance: m.explained_variance(),
        }
    }
}
