use std::cmp::Ordering;
use std::sync::Arc;

use photograph_store::VectorRepository;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cosine::cosine_similarity;
use crate::error::SearchError;

/// A single ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data_point_id: String,
    pub label: String,
    pub source_ref: String,
    pub similarity: f32,
}

/// SimilaritySearchEngine ranks a project's stored embeddings against a
/// query vector by exact linear scan.
pub struct SimilaritySearchEngine {
    repo: Arc<dyn VectorRepository>,
    dim: usize,
}

impl SimilaritySearchEngine {
    pub fn new(repo: Arc<dyn VectorRepository>, dim: usize) -> Self {
        Self { repo, dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return the `min(top_k, N)` most similar stored points, best first.
    ///
    /// Equal scores keep repository retrieval order.
    pub fn query(
        &self,
        project_id: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryResult>, SearchError> {
        if top_k == 0 {
            return Err(SearchError::InvalidTopK);
        }
        if query.len() != self.dim {
            return Err(SearchError::DimensionMismatch {
                id: "<query>".into(),
                got: query.len(),
                want: self.dim,
            });
        }

        let stored = self.repo.embeddings(project_id)?;
        if stored.is_empty() {
            return Err(SearchError::NoEmbeddings(project_id.to_string()));
        }

        let mut results = Vec::with_capacity(stored.len());
        for rec in stored {
            let v = rec.vector()?;
            if v.len() != self.dim {
                return Err(SearchError::DimensionMismatch {
                    id: rec.point.id,
                    got: v.len(),
                    want: self.dim,
                });
            }
            results.push(QueryResult {
                similarity: cosine_similarity(query, &v),
                data_point_id: rec.point.id,
                label: rec.point.label,
                source_ref: rec.point.source_ref,
            });
        }

        // sort_by is stable.
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(top_k);

        debug!(
            "search: project {project_id}: {} results (top_k={top_k})",
            results.len()
        );
        Ok(results)
    }
}
