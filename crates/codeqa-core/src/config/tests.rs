use std::io::Write;
use std::path::Path;

use codeqa_rag::FailurePolicy;
use codeqa_store::Metric;
use serial_test::serial;

use super::*;
use crate::vault::MockVaultProvider;

const ENV_KEYS: [&str; 24] = [
    "CODEQA_LLM_PROVIDER",
    "CODEQA_LLM_BASE_URL",
    "CODEQA_LLM_MODEL",
    "CODEQA_LLM_EMBEDDING_MODEL",
    "CODEQA_LLM_MAX_TOKENS",
    "CODEQA_VECTOR_STORE_BACKEND",
    "CODEQA_QDRANT_URL",
    "CODEQA_COLLECTION",
    "CODEQA_DIMENSION",
    "CODEQA_METRIC",
    "CODEQA_TOP_K",
    "CODEQA_CORPUS_PATH",
    "CODEQA_CODE_FIELD",
    "CODEQA_INDEX_LIMIT",
    "CODEQA_INDEX_CONCURRENCY",
    "CODEQA_FAILURE_POLICY",
    "CODEQA_RETRY_MAX_ATTEMPTS",
    "CODEQA_TIMEOUT_EMBEDDING",
    "CODEQA_TIMEOUT_VECTOR_STORE",
    "CODEQA_TIMEOUT_CHAT",
    "CODEQA_TIMEOUT_REQUEST",
    "CODEQA_GATEWAY_BIND",
    "CODEQA_GATEWAY_PORT",
    "CODEQA_GATEWAY_MAX_BODY",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
#[serial]
fn defaults_when_file_missing() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/codeqa.toml")).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.model, "gpt-3.5-turbo");
    assert_eq!(config.llm.embedding_model, "text-embedding-ada-002");
    assert_eq!(config.vector_store.backend, StoreBackend::Qdrant);
    assert_eq!(config.vector_store.collection, "code-assistant");
    assert_eq!(config.vector_store.dimension, 1536);
    assert_eq!(config.vector_store.metric, Metric::Cosine);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.indexer.limit, Some(1000));
    assert_eq!(config.indexer.concurrency, 4);
    assert_eq!(config.gateway.max_body_size, 1_048_576);
    config.validate().unwrap();
}

#[test]
#[serial]
fn parses_toml_sections() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[llm]
provider = "mock"
model = "gpt-4o-mini"

[vector_store]
backend = "memory"
collection = "snippets"
dimension = 8
metric = "dot"

[retrieval]
top_k = 5

[indexer]
code_field = "whole_func_string"
concurrency = 2
failure_policy = "abort"

[retry]
max_attempts = 5
base_delay_ms = 10
max_delay_ms = 100

[gateway]
port = 9000
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::Mock);
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert_eq!(config.llm.embedding_model, "text-embedding-ada-002");
    assert_eq!(config.vector_store.backend, StoreBackend::Memory);
    assert_eq!(config.vector_store.dimension, 8);
    assert_eq!(config.vector_store.metric, Metric::Dot);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.indexer.code_field, "whole_func_string");
    assert_eq!(config.indexer.failure_policy, FailurePolicy::Abort);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.bind, "127.0.0.1");
}

#[test]
#[serial]
fn malformed_toml_is_an_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[llm\nmodel = ").unwrap();
    assert!(Config::load(file.path()).is_err());
}

#[test]
#[serial]
fn env_overrides_apply() {
    clear_env();
    unsafe {
        std::env::set_var("CODEQA_LLM_PROVIDER", "mock");
        std::env::set_var("CODEQA_QDRANT_URL", "http://qdrant:6334");
        std::env::set_var("CODEQA_DIMENSION", "384");
        std::env::set_var("CODEQA_METRIC", "euclid");
        std::env::set_var("CODEQA_TOP_K", "7");
        std::env::set_var("CODEQA_INDEX_LIMIT", "0");
        std::env::set_var("CODEQA_FAILURE_POLICY", "abort");
        std::env::set_var("CODEQA_TIMEOUT_REQUEST", "15");
        std::env::set_var("CODEQA_GATEWAY_PORT", "8181");
    }
    let config = Config::load(Path::new("/nonexistent/codeqa.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Mock);
    assert_eq!(config.vector_store.url, "http://qdrant:6334");
    assert_eq!(config.vector_store.dimension, 384);
    assert_eq!(config.vector_store.metric, Metric::Euclid);
    assert_eq!(config.retrieval.top_k, 7);
    assert_eq!(config.indexer.limit, None);
    assert_eq!(config.indexer.failure_policy, FailurePolicy::Abort);
    assert_eq!(config.timeouts.request_secs, 15);
    assert_eq!(config.gateway.port, 8181);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("CODEQA_LLM_PROVIDER", "claude");
        std::env::set_var("CODEQA_DIMENSION", "lots");
        std::env::set_var("CODEQA_GATEWAY_PORT", "99999");
    }
    let config = Config::load(Path::new("/nonexistent/codeqa.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.vector_store.dimension, 1536);
    assert_eq!(config.gateway.port, 8090);
}

#[test]
fn validate_rejects_zero_values() {
    let mut config = Config::default();
    config.vector_store.dimension = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.indexer.concurrency = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retry.max_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.timeouts.chat_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn retry_policy_from_config() {
    let mut retry = RetryConfig::default();
    let policy = retry.policy();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.overall_timeout, Some(std::time::Duration::from_secs(60)));

    retry.overall_timeout_secs = 0;
    assert!(retry.policy().overall_timeout.is_none());
}

#[tokio::test]
async fn secrets_resolve_with_openai_fallback() {
    let vault = MockVaultProvider::default()
        .with_secret("OPENAI_API_KEY", "sk-fallback")
        .with_secret("CODEQA_GATEWAY_TOKEN", "gw");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    assert_eq!(
        config.secrets.openai_api_key.as_ref().unwrap().expose(),
        "sk-fallback"
    );
    assert_eq!(config.secrets.gateway_token.as_ref().unwrap().expose(), "gw");
    assert!(config.secrets.qdrant_api_key.is_none());

    let vault = MockVaultProvider::default()
        .with_secret("OPENAI_API_KEY", "sk-fallback")
        .with_secret("CODEQA_OPENAI_API_KEY", "sk-primary");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    assert_eq!(
        config.secrets.openai_api_key.as_ref().unwrap().expose(),
        "sk-primary"
    );
}

#[test]
fn secrets_are_redacted_in_debug() {
    let mut config = Config::default();
    config.secrets.openai_api_key = Some(crate::vault::Secret::new("sk-very-secret"));
    let dbg = format!("{config:?}");
    assert!(!dbg.contains("sk-very-secret"));
}
