use std::io::Write;
use std::path::{Path, PathBuf};

use codeqa_core::AppBuilder;
use codeqa_core::config::{Config, ProviderKind, StoreBackend};
use codeqa_rag::{RagError, RequestScope};
use serial_test::serial;

const CORPUS: &str = r#"{"code": "def add(a, b):\n    return a + b", "func_name": "add", "repo": "demo/math"}
{"code": "def sub(a, b):\n    return a - b", "func_name": "sub", "repo": "demo/math"}

not json at all
{"code": "def mul(a, b):\n    return a * b", "func_name": "mul", "repo": "demo/math"}
"#;

fn mock_config(dimension: usize) -> Config {
    let mut config = Config::default();
    config.llm.provider = ProviderKind::Mock;
    config.vector_store.backend = StoreBackend::Memory;
    config.vector_store.dimension = dimension;
    config
}

fn write_corpus(dir: &Path) -> PathBuf {
    let path = dir.join("corpus.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(CORPUS.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn shipped_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let config = Config::load(&path).unwrap();
    config.validate().unwrap();

    let defaults = Config::default();
    assert_eq!(config.llm.model, defaults.llm.model);
    assert_eq!(config.llm.embedding_model, defaults.llm.embedding_model);
    assert_eq!(config.vector_store.collection, defaults.vector_store.collection);
    assert_eq!(config.vector_store.dimension, defaults.vector_store.dimension);
    assert_eq!(config.retrieval.top_k, defaults.retrieval.top_k);
    assert_eq!(config.indexer.limit, defaults.indexer.limit);
    assert_eq!(config.timeouts.request_secs, defaults.timeouts.request_secs);
    assert_eq!(config.gateway.max_body_size, defaults.gateway.max_body_size);
}

#[tokio::test]
async fn index_corpus_then_answer() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path());
    let app = AppBuilder::from_config(mock_config(4), dir.path().join("codeqa.toml")).unwrap();
    let scope = RequestScope::new();

    let report = app
        .build_indexer()
        .load_and_index(&scope, &app.build_corpus(Some(&corpus)), None)
        .await
        .unwrap();
    assert_eq!(report.items_seen, 4);
    assert_eq!(report.indexed, 3);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, RagError::Input(_)));
    assert!(report.failures[0].id.is_none());
    assert_eq!(app.build_index().count(&scope).await.unwrap(), 3);

    let answer = app
        .build_assistant()
        .answer_with_context(&app.request_scope(), "how do I add numbers?")
        .await
        .unwrap();
    assert_eq!(answer.response, "mock response");
    assert_eq!(answer.context.len(), 3);
    for hit in &answer.context {
        assert!(hit.code().is_some_and(|c| c.starts_with("def ")));
        assert_eq!(hit.metadata.get("repo").map(String::as_str), Some("demo/math"));
    }
}

#[tokio::test]
async fn reindexing_does_not_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path());
    let app = AppBuilder::from_config(mock_config(4), PathBuf::new()).unwrap();
    let scope = RequestScope::new();
    let indexer = app.build_indexer();
    let source = app.build_corpus(Some(&corpus));

    indexer.load_and_index(&scope, &source, None).await.unwrap();
    let second = indexer.load_and_index(&scope, &source, None).await.unwrap();
    assert_eq!(second.indexed, 3);
    assert_eq!(app.build_index().count(&scope).await.unwrap(), 3);
}

#[tokio::test]
async fn limit_bounds_items_read() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path());
    let app = AppBuilder::from_config(mock_config(4), PathBuf::new()).unwrap();
    let scope = RequestScope::new();

    let report = app
        .build_indexer()
        .load_and_index(&scope, &app.build_corpus(Some(&corpus)), Some(2))
        .await
        .unwrap();
    assert_eq!(report.items_seen, 2);
    assert!(report.is_clean());
}

#[tokio::test]
async fn missing_corpus_is_an_input_error() {
    let app = AppBuilder::from_config(mock_config(4), PathBuf::new()).unwrap();
    let err = app
        .build_indexer()
        .load_and_index(
            &RequestScope::new(),
            &app.build_corpus(Some(Path::new("/nonexistent/corpus.jsonl"))),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Input(_)));
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let app = AppBuilder::from_config(mock_config(4), PathBuf::new()).unwrap();
    let err = app
        .build_assistant()
        .answer(&app.request_scope(), "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Input(_)));
}

#[tokio::test]
async fn fresh_app_answers_from_empty_index() {
    let app = AppBuilder::from_config(mock_config(4), PathBuf::new()).unwrap();
    let scope = app.request_scope();
    app.ensure_index(&scope).await.unwrap();

    let assistant = app.build_assistant();
    let hits = assistant
        .retriever()
        .semantic_search(&scope, "anything", 3)
        .await
        .unwrap();
    assert!(hits.is_empty());

    let answer = assistant
        .answer_with_context(&scope, "how do I add numbers?")
        .await
        .unwrap();
    assert_eq!(answer.response, "mock response");
    assert!(answer.context.is_empty());
}

#[tokio::test]
async fn ensure_index_is_idempotent() {
    let app = AppBuilder::from_config(mock_config(4), PathBuf::new()).unwrap();
    let scope = RequestScope::new();
    app.ensure_index(&scope).await.unwrap();
    app.ensure_index(&scope).await.unwrap();
    assert_eq!(app.build_index().count(&scope).await.unwrap(), 0);
}
