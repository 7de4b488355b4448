//! Corpus sources feeding the indexer.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use futures::{Stream, StreamExt};
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;

use crate::error::{RagError, Result};
use crate::snippet::CorpusItem;

/// Fields copied from a corpus record into snippet metadata when present.
pub const METADATA_FIELDS: &[&str] = &["repo", "path", "func_name", "language"];

pub type ItemStream<'a> = Pin<Box<dyn Stream<Item = Result<CorpusItem>> + Send + 'a>>;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Finite, restartable sequence of corpus items.
pub trait CorpusSource: Send + Sync {
    /// A fresh stream from the start of the source. A failed item does not
    /// end the stream.
    fn items(&self) -> BoxFuture<'_, Result<ItemStream<'_>>>;
}

/// In-memory list of items.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    items: Vec<CorpusItem>,
}

impl StaticCorpus {
    #[must_use]
    pub fn new(items: Vec<CorpusItem>) -> Self {
        Self { items }
    }

    /// Corpus of bare code strings without metadata.
    #[must_use]
    pub fn from_code<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(codes.into_iter().map(CorpusItem::new).collect())
    }
}

impl CorpusSource for StaticCorpus {
    fn items(&self) -> BoxFuture<'_, Result<ItemStream<'_>>> {
        Box::pin(async move {
            let stream: ItemStream<'_> = Box::pin(futures::stream::iter(
                self.items.iter().cloned().map(Ok),
            ));
            Ok(stream)
        })
    }
}

/// JSON Lines file with one CodeSearchNet-style record per line.
#[derive(Debug, Clone)]
pub struct JsonLinesCorpus {
    path: PathBuf,
    code_field: String,
}

impl JsonLinesCorpus {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            code_field: "code".into(),
        }
    }

    #[must_use]
    pub fn with_code_field(mut self, field: impl Into<String>) -> Self {
        self.code_field = field.into();
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(&self, line_no: usize, line: &str) -> Result<CorpusItem> {
        let record: serde_json::Map<String, serde_json::Value> = serde_json::from_str(line)
            .map_err(|e| RagError::Input(format!("line {line_no}: {e}")))?;

        let code = match record.get(&self.code_field) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(serde_json::Value::String(_)) => {
                return Err(RagError::Input(format!(
                    "line {line_no}: field `{}` is empty",
                    self.code_field
                )));
            }
            _ => {
                return Err(RagError::Input(format!(
                    "line {line_no}: missing string field `{}`",
                    self.code_field
                )));
            }
        };

        let metadata = METADATA_FIELDS
            .iter()
            .filter_map(|&key| match record.get(key) {
                Some(serde_json::Value::String(v)) => Some((key.to_owned(), v.clone())),
                _ => None,
            })
            .collect();

        Ok(CorpusItem { code, metadata })
    }
}

impl CorpusSource for JsonLinesCorpus {
    fn items(&self) -> BoxFuture<'_, Result<ItemStream<'_>>> {
        Box::pin(async move {
            let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
                RagError::Input(format!("cannot open corpus {}: {e}", self.path.display()))
            })?;
            let lines = LinesStream::new(tokio::io::BufReader::new(file).lines());

            let stream: ItemStream<'_> = Box::pin(lines.enumerate().filter_map(
                move |(i, line)| {
                    let line_no = i + 1;
                    let item = match line {
                        Ok(l) if l.trim().is_empty() => None,
                        Ok(l) => Some(self.parse_line(line_no, &l)),
                        Err(e) => Some(Err(RagError::Input(format!("line {line_no}: {e}")))),
                    };
                    futures::future::ready(item)
                },
            ));
            Ok(stream)
        })
    }
}
