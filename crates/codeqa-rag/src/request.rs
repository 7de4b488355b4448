//! Request-scoped cancellation and deadlines for upstream calls.

use std::future::Future;
use std::time::Duration;

use codeqa_llm::RetryPolicy;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{RagError, Result, ServiceErrorKind};

/// Cancellation token plus optional absolute deadline carried through one request.
///
/// Cloning shares the token, so cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope whose deadline is `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Guard that cancels the scope when dropped.
    #[must_use]
    pub fn drop_guard(&self) -> DropGuard {
        self.cancel.clone().drop_guard()
    }

    /// Time left until the deadline, `None` when the scope has no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Run one upstream call bounded by `min(timeout, remaining)` and raced
    /// against cancellation.
    ///
    /// # Errors
    ///
    /// Returns `Service(Cancelled)` or `Service(Timeout)` for `service`, or
    /// whatever `fut` fails with.
    pub async fn bound<T, F>(&self, service: &str, timeout: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(cancelled(service));
        }
        let budget = self.remaining().map_or(timeout, |r| r.min(timeout));
        if budget.is_zero() {
            return Err(timed_out(service, budget));
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(cancelled(service)),
            res = tokio::time::timeout(budget, fut) => {
                res.unwrap_or_else(|_| Err(timed_out(service, budget)))
            }
        }
    }
}

fn cancelled(service: &str) -> RagError {
    RagError::service(service, ServiceErrorKind::Cancelled, "request cancelled")
}

fn timed_out(service: &str, after: Duration) -> RagError {
    RagError::service(
        service,
        ServiceErrorKind::Timeout,
        format!("no response within {after:?}"),
    )
}

/// Per-call timeout and retry policy a component applies to each upstream call.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl CallPolicy {
    #[must_use]
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    /// Run `f` with retries, each attempt bounded by the scope. Cancellation
    /// and the scope deadline also interrupt backoff sleeps.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error, or a `Service` error of kind
    /// `Cancelled` / `Timeout`.
    pub async fn call<T, F, Fut>(&self, scope: &RequestScope, service: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        let attempts = self
            .retry
            .run(service, move || scope.bound(service, timeout, f()));

        let deadline = async {
            match scope.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = scope.token().cancelled() => Err(cancelled(service)),
            res = attempts => res,
            () = deadline => Err(RagError::service(
                service,
                ServiceErrorKind::Timeout,
                "request deadline exceeded",
            )),
        }
    }
}
