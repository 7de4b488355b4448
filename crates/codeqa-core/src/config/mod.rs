mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve credentials through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        let openai = match vault.get_secret("CODEQA_OPENAI_API_KEY").await? {
            Some(v) => Some(v),
            None => vault.get_secret("OPENAI_API_KEY").await?,
        };
        if let Some(val) = openai {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("CODEQA_QDRANT_API_KEY").await? {
            self.secrets.qdrant_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("CODEQA_GATEWAY_TOKEN").await? {
            self.secrets.gateway_token = Some(Secret::new(val));
        }
        Ok(())
    }

    /// Reject settings no component can run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.vector_store.dimension == 0 {
            bail!("vector_store.dimension must be greater than 0");
        }
        if self.vector_store.collection.trim().is_empty() {
            bail!("vector_store.collection must not be empty");
        }
        if self.indexer.concurrency == 0 {
            bail!("indexer.concurrency must be greater than 0");
        }
        if self.indexer.code_field.trim().is_empty() {
            bail!("indexer.code_field must not be empty");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be greater than 0");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            bail!("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }
        let t = &self.timeouts;
        if t.embedding_secs == 0 || t.vector_store_secs == 0 || t.chat_secs == 0 || t.request_secs == 0
        {
            bail!("timeouts must be greater than 0");
        }
        Ok(())
    }
}
