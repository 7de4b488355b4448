//! Text to fixed-dimension vector via an embedding provider.

use std::sync::Arc;

use codeqa_llm::LlmProvider;

use crate::error::{RagError, Result};
use crate::request::{CallPolicy, RequestScope};

const SERVICE: &str = "embedding";

/// Embedding client that enforces a fixed output dimension.
pub struct EmbeddingClient<P> {
    provider: Arc<P>,
    dimension: usize,
    policy: CallPolicy,
}

impl<P> Clone for EmbeddingClient<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            dimension: self.dimension,
            policy: self.policy.clone(),
        }
    }
}

impl<P: LlmProvider> EmbeddingClient<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, dimension: usize) -> Self {
        Self {
            provider,
            dimension,
            policy: CallPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed `text`. No caching; every call reaches the provider.
    ///
    /// # Errors
    ///
    /// `Input` for empty or whitespace-only text, `Validation` when the
    /// provider returns a vector of the wrong length, `Service` on upstream
    /// failure, timeout or cancellation.
    pub async fn embed(&self, scope: &RequestScope, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::Input("cannot embed empty text".into()));
        }

        let provider = &self.provider;
        let vector = self
            .policy
            .call(scope, SERVICE, || async move {
                provider
                    .embed(text)
                    .await
                    .map_err(|e| RagError::from_llm(SERVICE, e))
            })
            .await?;

        if vector.len() != self.dimension {
            return Err(RagError::Validation(format!(
                "{} returned a {}-dimensional embedding, expected {}",
                self.provider.name(),
                vector.len(),
                self.dimension
            )));
        }
        tracing::trace!(chars = text.len(), "embedded text");
        Ok(vector)
    }
}
