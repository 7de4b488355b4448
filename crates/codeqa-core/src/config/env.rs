use std::str::FromStr;

use serde::de::DeserializeOwned;

use super::Config;

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

/// Lowercase enum values such as `qdrant` or `abort`.
fn variant<T: DeserializeOwned>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
        Some(kind)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_store();
        self.apply_env_overrides_runtime();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Some(kind) = variant("CODEQA_LLM_PROVIDER") {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("CODEQA_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CODEQA_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CODEQA_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Some(n) = parsed("CODEQA_LLM_MAX_TOKENS") {
            self.llm.max_tokens = n;
        }
    }

    fn apply_env_overrides_store(&mut self) {
        if let Some(backend) = variant("CODEQA_VECTOR_STORE_BACKEND") {
            self.vector_store.backend = backend;
        }
        if let Ok(v) = std::env::var("CODEQA_QDRANT_URL") {
            self.vector_store.url = v;
        }
        if let Ok(v) = std::env::var("CODEQA_COLLECTION") {
            self.vector_store.collection = v;
        }
        if let Some(n) = parsed("CODEQA_DIMENSION") {
            self.vector_store.dimension = n;
        }
        if let Some(metric) = variant("CODEQA_METRIC") {
            self.vector_store.metric = metric;
        }
        if let Some(k) = parsed("CODEQA_TOP_K") {
            self.retrieval.top_k = k;
        }
    }

    fn apply_env_overrides_runtime(&mut self) {
        if let Ok(v) = std::env::var("CODEQA_CORPUS_PATH") {
            self.indexer.corpus_path = v;
        }
        if let Ok(v) = std::env::var("CODEQA_CODE_FIELD") {
            self.indexer.code_field = v;
        }
        if let Some(n) = parsed::<usize>("CODEQA_INDEX_LIMIT") {
            self.indexer.limit = (n > 0).then_some(n);
        }
        if let Some(n) = parsed("CODEQA_INDEX_CONCURRENCY") {
            self.indexer.concurrency = n;
        }
        if let Some(policy) = variant("CODEQA_FAILURE_POLICY") {
            self.indexer.failure_policy = policy;
        }
        if let Some(n) = parsed("CODEQA_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = n;
        }
        if let Some(secs) = parsed("CODEQA_TIMEOUT_EMBEDDING") {
            self.timeouts.embedding_secs = secs;
        }
        if let Some(secs) = parsed("CODEQA_TIMEOUT_VECTOR_STORE") {
            self.timeouts.vector_store_secs = secs;
        }
        if let Some(secs) = parsed("CODEQA_TIMEOUT_CHAT") {
            self.timeouts.chat_secs = secs;
        }
        if let Some(secs) = parsed("CODEQA_TIMEOUT_REQUEST") {
            self.timeouts.request_secs = secs;
        }
        if let Ok(v) = std::env::var("CODEQA_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Some(port) = parsed("CODEQA_GATEWAY_PORT") {
            self.gateway.port = port;
        }
        if let Some(size) = parsed("CODEQA_GATEWAY_MAX_BODY") {
            self.gateway.max_body_size = size;
        }
    }
}
