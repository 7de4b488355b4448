//! Snippet, corpus item and query result types.

use std::collections::HashMap;

use codeqa_store::{ScoredVectorPoint, VectorPoint};

/// Metadata key holding the snippet's source text.
pub const CODE_FIELD: &str = "code";

/// Content-derived snippet id: lowercase hex blake3 of the code text.
#[must_use]
pub fn snippet_id(code: &str) -> String {
    blake3::hash(code.as_bytes()).to_hex().to_string()
}

/// One raw record read from a corpus source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusItem {
    pub code: String,
    pub metadata: HashMap<String, String>,
}

impl CorpusItem {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CodeSnippet {
    pub id: String,
    pub code: String,
    pub embedding: Vec<f32>,
    /// Always contains [`CODE_FIELD`].
    pub metadata: HashMap<String, String>,
}

impl CodeSnippet {
    /// Build a snippet from a corpus item and its embedding. The id is derived
    /// from the code text.
    #[must_use]
    pub fn new(item: CorpusItem, embedding: Vec<f32>) -> Self {
        let CorpusItem { code, mut metadata } = item;
        metadata.insert(CODE_FIELD.into(), code.clone());
        Self {
            id: snippet_id(&code),
            code,
            embedding,
            metadata,
        }
    }

    pub(crate) fn into_point(self) -> VectorPoint {
        VectorPoint {
            id: self.id,
            vector: self.embedding,
            payload: to_payload(&self.metadata),
        }
    }
}

/// One ranked hit of a vector query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSnippet {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

impl ScoredSnippet {
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.metadata.get(CODE_FIELD).map(String::as_str)
    }
}

impl From<ScoredVectorPoint> for ScoredSnippet {
    fn from(p: ScoredVectorPoint) -> Self {
        let metadata = p
            .payload
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();
        Self {
            id: p.id,
            score: p.score,
            metadata,
        }
    }
}

/// Ranked hits, non-increasing by score.
pub type QueryResult = Vec<ScoredSnippet>;

pub(crate) fn to_payload(metadata: &HashMap<String, String>) -> HashMap<String, serde_json::Value> {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect()
}
