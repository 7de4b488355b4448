//! Per-query pipeline: retrieve, then generate.

use codeqa_llm::LlmProvider;

use crate::error::{RagError, Result};
use crate::generator::ResponseGenerator;
use crate::request::RequestScope;
use crate::retriever::{CodeRetriever, DEFAULT_TOP_K};
use crate::snippet::QueryResult;

/// Answer text together with the hits it was grounded in.
#[derive(Debug, Clone)]
pub struct Answer {
    pub response: String,
    pub context: QueryResult,
}

pub struct CodeAssistant<P> {
    retriever: CodeRetriever<P>,
    generator: ResponseGenerator<P>,
    top_k: usize,
}

impl<P: LlmProvider> CodeAssistant<P> {
    #[must_use]
    pub fn new(retriever: CodeRetriever<P>, generator: ResponseGenerator<P>) -> Self {
        Self {
            retriever,
            generator,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[must_use]
    pub fn retriever(&self) -> &CodeRetriever<P> {
        &self.retriever
    }

    /// # Errors
    ///
    /// `Input` for an empty query, `Service` if retrieval or generation fails.
    pub async fn answer(&self, scope: &RequestScope, query: &str) -> Result<String> {
        let query = self.checked(query)?;
        let snippets = self
            .retriever
            .semantic_search(scope, query, self.top_k)
            .await?;
        self.generator.generate(scope, query, &snippets).await
    }

    /// Like [`CodeAssistant::answer`], also returning the scored context.
    ///
    /// # Errors
    ///
    /// Same as [`CodeAssistant::answer`].
    pub async fn answer_with_context(&self, scope: &RequestScope, query: &str) -> Result<Answer> {
        let query = self.checked(query)?;
        let context = self.retriever.search(scope, query, self.top_k).await?;
        let snippets: Vec<&str> = context.iter().filter_map(|h| h.code()).collect();
        let response = self.generator.generate(scope, query, &snippets).await?;
        Ok(Answer { response, context })
    }

    fn checked<'q>(&self, query: &'q str) -> Result<&'q str> {
        if query.trim().is_empty() {
            Err(RagError::Input("query must not be empty".into()))
        } else {
            tracing::debug!(top_k = self.top_k, "answering query");
            Ok(query)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use codeqa_llm::mock::MockProvider;
    use codeqa_store::{InMemoryVectorStore, Metric};

    use super::*;
    use crate::embedding::EmbeddingClient;
    use crate::index::VectorIndex;

    fn assistant(provider: MockProvider) -> CodeAssistant<MockProvider> {
        let provider = Arc::new(provider);
        let index = VectorIndex::new(
            Arc::new(InMemoryVectorStore::new()),
            "code-assistant",
            1536,
            Metric::Cosine,
        );
        let retriever = CodeRetriever::new(EmbeddingClient::new(Arc::clone(&provider), 1536), index);
        CodeAssistant::new(retriever, ResponseGenerator::new(provider))
    }

    #[tokio::test]
    async fn empty_query_never_reaches_provider() {
        let provider = MockProvider::default();
        let err = assistant(provider.clone())
            .answer(&RequestScope::new(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Input(_)));
        assert_eq!(provider.embed_calls(), 0);
        assert!(provider.recorded_chats().is_empty());
    }

    #[test]
    fn default_top_k_is_three() {
        assert_eq!(assistant(MockProvider::default()).top_k(), 3);
    }
}
