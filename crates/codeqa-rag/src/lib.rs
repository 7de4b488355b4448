//! Retrieval-augmented code question answering.
//!
//! Corpus items are embedded and upserted into a [`VectorIndex`] by the
//! [`CodeIndexer`]. At query time the [`CodeRetriever`] embeds the question,
//! fetches the nearest snippets, and the [`ResponseGenerator`] asks a chat
//! model for an answer grounded in them. Every upstream call runs under a
//! [`RequestScope`] and a [`CallPolicy`].

pub mod assistant;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod indexer;
pub mod request;
pub mod retriever;
pub mod snippet;

pub use assistant::{Answer, CodeAssistant};
pub use corpus::{CorpusSource, JsonLinesCorpus, StaticCorpus};
pub use embedding::EmbeddingClient;
pub use error::{RagError, Result, ServiceErrorKind};
pub use generator::{ResponseGenerator, SYSTEM_PROMPT, build_prompt};
pub use index::VectorIndex;
pub use indexer::{CodeIndexer, FailurePolicy, IndexFailure, IndexReport, IndexerConfig};
pub use request::{CallPolicy, RequestScope};
pub use retriever::{CodeRetriever, DEFAULT_TOP_K};
pub use snippet::{CodeSnippet, CorpusItem, QueryResult, ScoredSnippet, snippet_id};
