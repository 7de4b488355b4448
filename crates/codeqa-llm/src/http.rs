//! reqwest client construction shared by HTTP-backed providers.

use std::time::Duration;

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const USER_AGENT: &str = concat!("codeqa/", env!("CARGO_PKG_VERSION"));

/// rustls client with the codeqa user agent. `request_timeout` only bounds
/// calls made outside a request scope.
pub(crate) fn client(request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("HTTP client builder failed, using defaults: {e}");
            reqwest::Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_crate_version() {
        assert!(USER_AGENT.starts_with("codeqa/"));
        assert!(USER_AGENT.len() > "codeqa/".len());
    }
}
