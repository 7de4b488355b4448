//! Application bootstrap: config resolution and component construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use codeqa_llm::AnyProvider;
use codeqa_llm::openai::OpenAiProvider;
use codeqa_rag::{
    CallPolicy, CodeAssistant, CodeIndexer, CodeRetriever, EmbeddingClient, IndexerConfig,
    JsonLinesCorpus, RequestScope, ResponseGenerator, VectorIndex,
};
use codeqa_store::{InMemoryVectorStore, QdrantOps, VectorStore};

use crate::config::{Config, ProviderKind, StoreBackend};
use crate::vault::{EnvVaultProvider, VaultProvider};

/// Resolved configuration plus shared provider and store handles.
pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
    provider: Arc<AnyProvider>,
    store: Arc<dyn VectorStore>,
}

impl AppBuilder {
    /// Load, validate and resolve secrets from the environment, then build
    /// the provider and vector store.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or a backend cannot be built.
    pub async fn from_path(config_path: &Path) -> anyhow::Result<Self> {
        Self::with_vault(config_path, &EnvVaultProvider).await
    }

    /// # Errors
    ///
    /// See [`AppBuilder::from_path`].
    pub async fn with_vault(config_path: &Path, vault: &dyn VaultProvider) -> anyhow::Result<Self> {
        let mut config = Config::load(config_path)?;
        config.validate()?;
        config.resolve_secrets(vault).await?;
        Self::from_config(config, config_path.to_path_buf())
    }

    /// # Errors
    ///
    /// Returns an error if a required credential is missing or the Qdrant
    /// client cannot be created.
    pub fn from_config(config: Config, config_path: PathBuf) -> anyhow::Result<Self> {
        let provider = Arc::new(create_provider(&config)?);
        let store = create_store(&config)?;
        tracing::info!(
            provider = config.llm.provider.as_str(),
            backend = ?config.vector_store.backend,
            collection = %config.vector_store.collection,
            "components configured"
        );
        Ok(Self {
            config,
            config_path,
            provider,
            store,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn build_embedder(&self) -> EmbeddingClient<AnyProvider> {
        EmbeddingClient::new(Arc::clone(&self.provider), self.config.vector_store.dimension)
            .with_policy(self.policy(self.config.timeouts.embedding_secs))
    }

    #[must_use]
    pub fn build_index(&self) -> VectorIndex {
        let vs = &self.config.vector_store;
        VectorIndex::new(self.store(), vs.collection.clone(), vs.dimension, vs.metric)
            .with_policy(self.policy(self.config.timeouts.vector_store_secs))
    }

    /// Create the configured collection if it is missing. Queries against a
    /// fresh store need it to exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or the existing
    /// collection has a different dimension.
    pub async fn ensure_index(&self, scope: &RequestScope) -> anyhow::Result<()> {
        self.build_index()
            .ensure_collection(scope)
            .await
            .with_context(|| {
                format!(
                    "vector collection {} is not usable",
                    self.config.vector_store.collection
                )
            })
    }

    #[must_use]
    pub fn build_indexer(&self) -> CodeIndexer<AnyProvider> {
        CodeIndexer::new(
            self.build_embedder(),
            self.build_index(),
            IndexerConfig {
                concurrency: self.config.indexer.concurrency,
                failure_policy: self.config.indexer.failure_policy,
            },
        )
    }

    #[must_use]
    pub fn build_assistant(&self) -> CodeAssistant<AnyProvider> {
        let retriever = CodeRetriever::new(self.build_embedder(), self.build_index());
        let generator = ResponseGenerator::new(Arc::clone(&self.provider))
            .with_policy(self.policy(self.config.timeouts.chat_secs));
        CodeAssistant::new(retriever, generator).with_top_k(self.config.retrieval.top_k)
    }

    /// Corpus at `path`, or the configured corpus path.
    #[must_use]
    pub fn build_corpus(&self, path: Option<&Path>) -> JsonLinesCorpus {
        let path = path.map_or_else(
            || PathBuf::from(&self.config.indexer.corpus_path),
            Path::to_path_buf,
        );
        JsonLinesCorpus::new(path).with_code_field(self.config.indexer.code_field.clone())
    }

    /// Scope for one inbound query, bounded by `timeouts.request_secs`.
    #[must_use]
    pub fn request_scope(&self) -> RequestScope {
        RequestScope::with_timeout(self.request_timeout())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.request_secs)
    }

    fn policy(&self, timeout_secs: u64) -> CallPolicy {
        CallPolicy::new(Duration::from_secs(timeout_secs), self.config.retry.policy())
    }
}

/// Build the configured LLM provider.
///
/// # Errors
///
/// Returns an error if the OpenAI key is missing or the mock provider is
/// requested without the `mock` feature.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("CODEQA_OPENAI_API_KEY (or OPENAI_API_KEY) not set")?
                .expose()
                .to_owned();
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key,
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                config.llm.max_tokens,
                Some(config.llm.embedding_model.clone()),
            )))
        }
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyProvider::Mock(
            codeqa_llm::mock::MockProvider::default()
                .with_embedding(vec![1.0; config.vector_store.dimension]),
        )),
        #[cfg(not(feature = "mock"))]
        ProviderKind::Mock => {
            anyhow::bail!("llm.provider = \"mock\" requires the `mock` feature")
        }
    }
}

/// Build the configured vector store backend.
///
/// # Errors
///
/// Returns an error if the Qdrant client cannot be created.
pub fn create_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend {
        StoreBackend::Qdrant => {
            let api_key = config
                .secrets
                .qdrant_api_key
                .as_ref()
                .map(|s| s.expose().to_owned());
            let ops = QdrantOps::new(&config.vector_store.url, api_key)
                .with_context(|| format!("invalid Qdrant URL {}", config.vector_store.url))?;
            Ok(Arc::new(ops))
        }
        StoreBackend::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}

/// `--config` value, else `CODEQA_CONFIG`, else `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("CODEQA_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
