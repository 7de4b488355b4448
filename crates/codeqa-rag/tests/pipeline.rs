use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use codeqa_llm::RetryPolicy;
use codeqa_llm::mock::MockProvider;
use codeqa_rag::{
    CallPolicy, CodeAssistant, CodeIndexer, CodeRetriever, EmbeddingClient, IndexerConfig,
    JsonLinesCorpus, RagError, RequestScope, ResponseGenerator, ServiceErrorKind, StaticCorpus,
    VectorIndex,
};
use codeqa_store::{InMemoryVectorStore, Metric, VectorStore};

const FOO: &str = "def foo(): pass";
const ADD: &str = "def add(a,b): return a+b";
const QUERY: &str = "how do I add two numbers?";

struct Pipeline {
    indexer: CodeIndexer<MockProvider>,
    assistant: CodeAssistant<MockProvider>,
    index: VectorIndex,
}

fn pipeline(provider: MockProvider, timeout: Duration) -> Pipeline {
    let policy = CallPolicy::new(
        timeout,
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: true,
            overall_timeout: Some(Duration::from_secs(5)),
        },
    );
    let provider = Arc::new(provider);
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let index = VectorIndex::new(store, "code-assistant", 3, Metric::Cosine)
        .with_policy(policy.clone());
    let embedder = EmbeddingClient::new(Arc::clone(&provider), 3).with_policy(policy.clone());

    Pipeline {
        indexer: CodeIndexer::new(embedder.clone(), index.clone(), IndexerConfig::default()),
        assistant: CodeAssistant::new(
            CodeRetriever::new(embedder, index.clone()),
            ResponseGenerator::new(provider).with_policy(policy),
        ),
        index,
    }
}

fn provider() -> MockProvider {
    MockProvider::with_responses(vec!["Use `add(a, b)`.".into()])
        .with_embedding(vec![0.0, 0.0, 1.0])
        .with_embedding_for(FOO, vec![1.0, 0.0, 0.0])
        .with_embedding_for(ADD, vec![0.0, 1.0, 0.0])
        .with_embedding_for(QUERY, vec![0.1, 0.9, 0.0])
}

#[tokio::test]
async fn index_then_answer_uses_closest_snippet() {
    let mock = provider();
    let p = pipeline(mock.clone(), Duration::from_secs(1));
    let scope = RequestScope::new();

    let report = p
        .indexer
        .load_and_index(&scope, &StaticCorpus::from_code([FOO, ADD]), None)
        .await
        .unwrap();
    assert_eq!(report.indexed, 2);

    let top = p
        .assistant
        .retriever()
        .semantic_search(&scope, QUERY, 1)
        .await
        .unwrap();
    assert_eq!(top, vec![ADD.to_owned()]);

    let answer = p.assistant.answer(&scope, QUERY).await.unwrap();
    assert_eq!(answer, "Use `add(a, b)`.");

    let chats = mock.recorded_chats();
    let prompt = &chats.last().unwrap()[1].content;
    assert!(prompt.starts_with(&format!("Context:\n{ADD}\n{FOO}")), "{prompt}");
    assert!(prompt.ends_with(&format!("Query: {QUERY}\n\nResponse:")));
}

#[tokio::test]
async fn empty_collection_answers_with_empty_context() {
    let mock = provider();
    let p = pipeline(mock.clone(), Duration::from_secs(1));
    let scope = RequestScope::new();
    p.index.ensure_collection(&scope).await.unwrap();

    let hits = p
        .assistant
        .retriever()
        .semantic_search(&scope, "anything", 3)
        .await
        .unwrap();
    assert!(hits.is_empty());

    let answer = p.assistant.answer(&scope, "anything").await.unwrap();
    assert!(!answer.is_empty());
    let prompt = &mock.recorded_chats()[0][1].content;
    assert!(prompt.starts_with("Context:\n\n\nQuery: anything"));
}

#[tokio::test]
async fn jsonl_reindex_is_idempotent() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"code": "{FOO}", "func_name": "foo"}}"#).unwrap();
    writeln!(file, r#"{{"code": "{ADD}", "func_name": "add"}}"#).unwrap();
    writeln!(file, r#"{{"code": "{FOO}", "func_name": "foo"}}"#).unwrap();

    let p = pipeline(provider(), Duration::from_secs(1));
    let scope = RequestScope::new();
    let corpus = JsonLinesCorpus::new(file.path());

    let first = p.indexer.load_and_index(&scope, &corpus, None).await.unwrap();
    let second = p.indexer.load_and_index(&scope, &corpus, None).await.unwrap();
    assert_eq!(first.indexed, 3);
    assert_eq!(second.indexed, 3);
    assert_eq!(p.index.count(&scope).await.unwrap(), 2);

    let ctx = p
        .assistant
        .answer_with_context(&scope, QUERY)
        .await
        .unwrap()
        .context;
    assert_eq!(ctx[0].metadata["func_name"], "add");
}

#[tokio::test]
async fn slow_embedding_surfaces_timeout() {
    let p = pipeline(provider().with_delay(2_000), Duration::from_millis(30));
    let err = p
        .assistant
        .answer(&RequestScope::new(), QUERY)
        .await
        .unwrap_err();
    assert_eq!(err.service_kind(), Some(ServiceErrorKind::Timeout), "{err}");
}

#[tokio::test]
async fn request_deadline_bounds_the_whole_answer() {
    let p = pipeline(provider().with_delay(2_000), Duration::from_secs(30));
    let started = std::time::Instant::now();
    let err = p
        .assistant
        .answer(&RequestScope::with_timeout(Duration::from_millis(50)), QUERY)
        .await
        .unwrap_err();
    assert_eq!(err.service_kind(), Some(ServiceErrorKind::Timeout), "{err}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn cancelling_scope_stops_in_flight_answer() {
    let p = pipeline(provider().with_delay(5_000), Duration::from_secs(30));
    let scope = RequestScope::new();
    let canceller = scope.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = p.assistant.answer(&scope, QUERY).await.unwrap_err();
    assert_eq!(err.service_kind(), Some(ServiceErrorKind::Cancelled));
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let mock = provider().with_auth_failure();
    let p = pipeline(mock.clone(), Duration::from_secs(1));
    let err = p
        .assistant
        .answer(&RequestScope::new(), QUERY)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::Service {
            kind: ServiceErrorKind::Auth,
            ..
        }
    ));
    assert_eq!(mock.embed_calls(), 1);
}
