//! Prompt assembly and chat completion.

use std::sync::Arc;

use codeqa_llm::{LlmProvider, Message};

use crate::error::{RagError, Result};
use crate::request::{CallPolicy, RequestScope};

const SERVICE: &str = "chat";

pub const SYSTEM_PROMPT: &str = "You are a helpful coding assistant.";

/// Render the user turn from retrieved snippets and the query.
#[must_use]
pub fn build_prompt<S: AsRef<str>>(query: &str, snippets: &[S]) -> String {
    let context = snippets
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");
    format!("Context:\n{context}\n\nQuery: {query}\n\nResponse:")
}

pub struct ResponseGenerator<P> {
    provider: Arc<P>,
    policy: CallPolicy,
}

impl<P: LlmProvider> ResponseGenerator<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            policy: CallPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Answer `query` grounded in `snippets`. An empty snippet list still
    /// produces a prompt with an empty context block.
    ///
    /// # Errors
    ///
    /// `Service` if the chat completion fails or returns no choice.
    pub async fn generate<S: AsRef<str>>(
        &self,
        scope: &RequestScope,
        query: &str,
        snippets: &[S],
    ) -> Result<String> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(build_prompt(query, snippets)),
        ];
        let messages = &messages;
        let provider = &self.provider;

        let answer = self
            .policy
            .call(scope, SERVICE, || async move {
                provider
                    .chat(messages)
                    .await
                    .map_err(|e| RagError::from_llm(SERVICE, e))
            })
            .await?;
        tracing::debug!(
            provider = self.provider.name(),
            context_snippets = snippets.len(),
            answer_chars = answer.len(),
            "generated response"
        );
        Ok(answer)
    }
}
