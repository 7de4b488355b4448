//! Named vector collection with a fixed dimension and metric.

use std::collections::HashMap;
use std::sync::Arc;

use codeqa_store::{Metric, VectorPoint, VectorStore};

use crate::error::{RagError, Result};
use crate::request::{CallPolicy, RequestScope};
use crate::snippet::{CodeSnippet, QueryResult, ScoredSnippet, to_payload};

const SERVICE: &str = "vector_store";

/// Collection handle that validates dimensions before reaching the backend.
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    name: String,
    dimension: usize,
    metric: Metric,
    policy: CallPolicy,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("name", &self.name)
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        name: impl Into<String>,
        dimension: usize,
        metric: Metric,
    ) -> Self {
        Self {
            store,
            name: name.into(),
            dimension,
            metric,
            policy: CallPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Create the collection if absent.
    ///
    /// # Errors
    ///
    /// `Config` if the collection exists with another dimension or metric,
    /// `Service` if the backend cannot be reached.
    pub async fn ensure_collection(&self, scope: &RequestScope) -> Result<()> {
        let size = self.dimension as u64;
        self.policy
            .call(scope, SERVICE, || async move {
                self.store
                    .ensure_collection(&self.name, size, self.metric)
                    .await
                    .map_err(RagError::from_store)
            })
            .await
    }

    /// Insert or overwrite the entry for `id`.
    ///
    /// # Errors
    ///
    /// `Validation` if the vector has the wrong dimension, `Service` on
    /// backend failure.
    pub async fn upsert(
        &self,
        scope: &RequestScope,
        id: &str,
        vector: Vec<f32>,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        self.check_dimension(vector.len())?;
        let point = VectorPoint {
            id: id.to_owned(),
            vector,
            payload: to_payload(metadata),
        };
        self.upsert_point(scope, point).await
    }

    /// Upsert a snippet under its content-derived id.
    ///
    /// # Errors
    ///
    /// See [`VectorIndex::upsert`].
    pub async fn upsert_snippet(&self, scope: &RequestScope, snippet: CodeSnippet) -> Result<()> {
        self.check_dimension(snippet.embedding.len())?;
        self.upsert_point(scope, snippet.into_point()).await
    }

    async fn upsert_point(&self, scope: &RequestScope, point: VectorPoint) -> Result<()> {
        let point = &point;
        self.policy
            .call(scope, SERVICE, || async move {
                self.store
                    .upsert(&self.name, vec![point.clone()])
                    .await
                    .map_err(RagError::from_store)
            })
            .await
    }

    /// Up to `k` entries by descending similarity, ties by ascending id.
    ///
    /// # Errors
    ///
    /// `Validation` if the query vector has the wrong dimension, `Service`
    /// on backend failure.
    pub async fn query(&self, scope: &RequestScope, vector: &[f32], k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(vector.len())?;

        let limit = k as u64;
        let mut hits: Vec<ScoredSnippet> = self
            .policy
            .call(scope, SERVICE, || async move {
                self.store
                    .search(&self.name, vector.to_vec(), limit)
                    .await
                    .map_err(RagError::from_store)
            })
            .await?
            .into_iter()
            .map(ScoredSnippet::from)
            .collect();
        hits.truncate(k);
        tracing::debug!(collection = %self.name, k, hits = hits.len(), "vector query");
        Ok(hits)
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// `Service` on backend failure.
    pub async fn count(&self, scope: &RequestScope) -> Result<u64> {
        self.policy
            .call(scope, SERVICE, || async move {
                self.store
                    .count(&self.name)
                    .await
                    .map_err(RagError::from_store)
            })
            .await
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(RagError::Validation(format!(
                "vector has dimension {actual}, index {} expects {}",
                self.name, self.dimension
            )))
        }
    }
}
