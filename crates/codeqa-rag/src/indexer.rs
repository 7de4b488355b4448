//! Batch indexing orchestrator: corpus → embed → upsert.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use codeqa_llm::LlmProvider;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::corpus::CorpusSource;
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result, ServiceErrorKind};
use crate::index::VectorIndex;
use crate::request::RequestScope;
use crate::snippet::{CodeSnippet, CorpusItem, snippet_id};

const PROGRESS_EVERY: usize = 100;

/// What to do after an item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Continue,
    /// Stop scheduling new items after the first failure.
    Abort,
}

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Items embedded and upserted at the same time.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

#[derive(Debug)]
pub struct IndexFailure {
    /// Zero-based position of the item in the source.
    pub position: usize,
    pub id: Option<String>,
    pub error: RagError,
}

/// Summary of an indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub items_seen: usize,
    pub indexed: usize,
    pub failures: Vec<IndexFailure>,
    pub duration_ms: u64,
}

impl IndexReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Populates a [`VectorIndex`] from a corpus source.
pub struct CodeIndexer<P> {
    embedder: EmbeddingClient<P>,
    index: VectorIndex,
    config: IndexerConfig,
}

impl<P: LlmProvider> CodeIndexer<P> {
    #[must_use]
    pub fn new(embedder: EmbeddingClient<P>, index: VectorIndex, config: IndexerConfig) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Index at most `limit` items from `source`, restarting the source from
    /// its beginning. Item failures are collected in the report.
    ///
    /// # Errors
    ///
    /// Returns an error only if the collection cannot be ensured or the
    /// source cannot be opened.
    pub async fn load_and_index(
        &self,
        scope: &RequestScope,
        source: &dyn CorpusSource,
        limit: Option<usize>,
    ) -> Result<IndexReport> {
        let start = Instant::now();
        let mut report = IndexReport::default();

        self.index.ensure_collection(scope).await?;

        let items = source.items().await?;
        let items = match limit {
            Some(n) => items.take(n).left_stream(),
            None => items.right_stream(),
        };

        let concurrency = self.config.concurrency.max(1);
        tracing::info!(
            collection = self.index.name(),
            concurrency,
            limit = ?limit,
            "indexing started"
        );

        // Set on abort or cancellation; items already in flight are still drained.
        let stop = AtomicBool::new(false);
        let mut outcomes = items
            .take_while(|_| futures::future::ready(!stop.load(Ordering::Relaxed)))
            .enumerate()
            .map(|(position, item)| self.index_item(scope, position, item))
            .buffer_unordered(concurrency);

        while let Some(outcome) = outcomes.next().await {
            report.items_seen += 1;
            match outcome {
                Ok(id) => {
                    report.indexed += 1;
                    tracing::debug!(%id, "snippet indexed");
                }
                Err(failure) => {
                    tracing::warn!(
                        position = failure.position,
                        id = failure.id.as_deref().unwrap_or("-"),
                        "indexing item failed: {}",
                        failure.error
                    );
                    let cancelled =
                        failure.error.service_kind() == Some(ServiceErrorKind::Cancelled);
                    report.failures.push(failure);
                    if self.config.failure_policy == FailurePolicy::Abort || cancelled {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
            }
            if report.items_seen % PROGRESS_EVERY == 0 {
                tracing::info!(
                    seen = report.items_seen,
                    indexed = report.indexed,
                    failed = report.failures.len(),
                    "indexing progress"
                );
            }
        }

        report.failures.sort_by_key(|f| f.position);
        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            seen = report.items_seen,
            indexed = report.indexed,
            failed = report.failures.len(),
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    async fn index_item(
        &self,
        scope: &RequestScope,
        position: usize,
        item: Result<CorpusItem>,
    ) -> std::result::Result<String, IndexFailure> {
        let fail = |id: Option<String>, error: RagError| IndexFailure {
            position,
            id,
            error,
        };

        let item = item.map_err(|e| fail(None, e))?;
        if item.code.trim().is_empty() {
            return Err(fail(None, RagError::Input("empty code text".into())));
        }

        let id = snippet_id(&item.code);
        let embedding = match self.embedder.embed(scope, &item.code).await {
            Ok(v) => v,
            Err(e) => return Err(fail(Some(id), e)),
        };
        let snippet = CodeSnippet::new(item, embedding);
        match self.index.upsert_snippet(scope, snippet).await {
            Ok(()) => Ok(id),
            Err(e) => Err(fail(Some(id), e)),
        }
    }
}
