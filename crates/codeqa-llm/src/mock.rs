//! Test-only mock provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    embeddings: HashMap<String, Vec<f32>>,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_auth: bool,
    /// Milliseconds to sleep before answering any call.
    pub delay_ms: u64,
    transient_failures: Arc<AtomicU32>,
    embed_calls: Arc<AtomicUsize>,
    chats: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: vec![0.0; 1536],
            embeddings: HashMap::new(),
            supports_embeddings: true,
            fail_chat: false,
            fail_auth: false,
            delay_ms: 0,
            transient_failures: Arc::new(AtomicU32::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            chats: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Vector returned for texts without an explicit mapping.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    #[must_use]
    pub fn with_embedding_for(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.embeddings.insert(text.to_owned(), embedding);
        self
    }

    /// The next `n` calls (chat or embed) fail with `RateLimited`.
    #[must_use]
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn with_auth_failure(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Every message list passed to `chat`, oldest first.
    #[must_use]
    pub fn recorded_chats(&self) -> Vec<Vec<Message>> {
        self.chats.lock().unwrap().clone()
    }

    async fn simulate(&self) -> Result<(), LlmError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_auth {
            return Err(LlmError::Unauthorized {
                provider: "mock".into(),
                status: 401,
            });
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(LlmError::RateLimited);
        }
        Ok(())
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.chats.lock().unwrap().push(messages.to_vec());
        self.simulate().await?;
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        self.simulate().await?;
        Ok(self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.embedding.clone()))
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responses_are_consumed_in_order() {
        let p = MockProvider::with_responses(vec!["a".into(), "b".into()]);
        assert_eq!(p.chat(&[Message::user("x")]).await.unwrap(), "a");
        assert_eq!(p.chat(&[Message::user("y")]).await.unwrap(), "b");
        assert_eq!(p.chat(&[Message::user("z")]).await.unwrap(), "mock response");
        assert_eq!(p.recorded_chats().len(), 3);
    }

    #[tokio::test]
    async fn embedding_lookup_falls_back_to_default() {
        let p = MockProvider::default()
            .with_embedding(vec![1.0, 0.0])
            .with_embedding_for("b", vec![0.0, 1.0]);
        assert_eq!(p.embed("a").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(p.embed("b").await.unwrap(), vec![0.0, 1.0]);
        assert_eq!(p.embed_calls(), 2);
    }

    #[tokio::test]
    async fn transient_failures_then_success() {
        let p = MockProvider::default().with_transient_failures(1);
        assert!(matches!(p.embed("a").await, Err(LlmError::RateLimited)));
        assert!(p.embed("a").await.is_ok());
    }
}
