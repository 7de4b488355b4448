//! Error taxonomy shared by every pipeline component.

use std::fmt;

use codeqa_llm::{LlmError, RetryTimeout, Retryable};
use codeqa_store::VectorStoreError;

/// What went wrong when talking to an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    Network,
    Auth,
    RateLimited,
    Timeout,
    Unavailable,
    Cancelled,
    /// The service answered, but with an error or a response we cannot use.
    Upstream,
}

impl ServiceErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::Cancelled => "cancelled",
            Self::Upstream => "upstream",
        }
    }

    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::RateLimited | Self::Timeout | Self::Unavailable
        )
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Empty or malformed query or corpus item.
    #[error("invalid input: {0}")]
    Input(String),

    /// Vector dimension does not match the index.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Existing collection settings are incompatible with the configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{service} failed ({kind}): {message}")]
    Service {
        service: String,
        kind: ServiceErrorKind,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    pub fn service(
        service: impl Into<String>,
        kind: ServiceErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            service: service.into(),
            kind,
            message: message.into(),
        }
    }

    /// Kind of a `Service` error, `None` for every other variant.
    #[must_use]
    pub fn service_kind(&self) -> Option<ServiceErrorKind> {
        match self {
            Self::Service { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Map a provider error into the taxonomy, attributing it to `service`.
    #[must_use]
    pub fn from_llm(service: &str, err: LlmError) -> Self {
        let kind = match &err {
            LlmError::Http(e) if e.is_timeout() => ServiceErrorKind::Timeout,
            LlmError::Http(e) if e.is_connect() || e.is_request() => ServiceErrorKind::Network,
            LlmError::RateLimited => ServiceErrorKind::RateLimited,
            LlmError::Unauthorized { .. } => ServiceErrorKind::Auth,
            LlmError::Unavailable { .. } => ServiceErrorKind::Unavailable,
            LlmError::Timeout(_) => ServiceErrorKind::Timeout,
            LlmError::Http(_)
            | LlmError::Json(_)
            | LlmError::Api { .. }
            | LlmError::EmptyResponse { .. }
            | LlmError::EmbedUnsupported { .. }
            | LlmError::Other(_) => ServiceErrorKind::Upstream,
        };
        Self::service(service, kind, err.to_string())
    }

    /// Map a vector store error into the taxonomy.
    #[must_use]
    pub fn from_store(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::Dimension { .. } => Self::Validation(err.to_string()),
            VectorStoreError::Mismatch { .. } => Self::Config(err.to_string()),
            VectorStoreError::Connection(_)
            | VectorStoreError::Upsert(_)
            | VectorStoreError::Search(_)
            | VectorStoreError::Count(_) => Self::service(
                "vector_store",
                ServiceErrorKind::Unavailable,
                err.to_string(),
            ),
            VectorStoreError::Collection(_) | VectorStoreError::Serialization(_) => {
                Self::service("vector_store", ServiceErrorKind::Upstream, err.to_string())
            }
        }
    }
}

impl Retryable for RagError {
    fn is_retryable(&self) -> bool {
        self.service_kind()
            .is_some_and(ServiceErrorKind::is_retryable)
    }
}

impl From<RetryTimeout> for RagError {
    fn from(t: RetryTimeout) -> Self {
        Self::service(
            t.operation,
            ServiceErrorKind::Timeout,
            format!("retry budget exhausted after {:?}", t.elapsed),
        )
    }
}
