//! Semantic retrieval of stored code snippets.

use codeqa_llm::LlmProvider;

use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::request::RequestScope;
use crate::snippet::QueryResult;

pub const DEFAULT_TOP_K: usize = 3;

pub struct CodeRetriever<P> {
    embedder: EmbeddingClient<P>,
    index: VectorIndex,
}

impl<P: LlmProvider> CodeRetriever<P> {
    #[must_use]
    pub fn new(embedder: EmbeddingClient<P>, index: VectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Scored hits for `query`, at most `k`, non-increasing by score.
    ///
    /// # Errors
    ///
    /// `Input` for an empty query, `Service` if embedding or the index query
    /// fails.
    pub async fn search(&self, scope: &RequestScope, query: &str, k: usize) -> Result<QueryResult> {
        if query.trim().is_empty() {
            return Err(RagError::Input("query must not be empty".into()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(scope, query).await?;
        self.index.query(scope, &embedding, k).await
    }

    /// Code text of the top `k` snippets, most similar first. Hits without
    /// code are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`CodeRetriever::search`]; no partial result is returned.
    pub async fn semantic_search(
        &self,
        scope: &RequestScope,
        query: &str,
        k: usize,
    ) -> Result<Vec<String>> {
        let hits = self.search(scope, query, k).await?;
        let codes = hits
            .into_iter()
            .filter_map(|hit| {
                let code = hit.code().map(str::to_owned);
                if code.is_none() {
                    tracing::warn!(id = %hit.id, "search hit has no code field, skipping");
                }
                code
            })
            .collect();
        Ok(codes)
    }
}
