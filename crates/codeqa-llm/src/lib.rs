//! Embedding and chat-completion provider abstraction.

pub mod any;
pub mod error;
pub(crate) mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod retry;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
pub use retry::{RetryPolicy, RetryTimeout, Retryable};
