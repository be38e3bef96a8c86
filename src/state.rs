use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, LlmConfig};
use crate::eval::cache::{EvaluationCache, SystemClock};
use crate::llm::provider::{self, LlmProvider};
use crate::search::store::ChunkStore;

/// Shared application state. The provider is resolved once here; request
/// handlers only ever see the trait object. Model names live behind a lock
/// so the admin API can swap them at runtime, while provider, base URL and
/// API key stay fixed for the process lifetime.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<ChunkStore>,
    pub llm: Arc<dyn LlmProvider>,
    pub llm_config: Arc<RwLock<LlmConfig>>,
    pub http_client: reqwest::Client,
    pub eval_cache: Arc<EvaluationCache>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        let store = Arc::new(ChunkStore::load(&config.store_path)?);
        tracing::info!(
            "Loaded {} chunks from {}",
            store.len(),
            config.store_path.display()
        );

        let llm = provider::from_config(http_client.clone(), &config.llm)?;
        let llm_config = Arc::new(RwLock::new(config.llm.clone()));

        let eval_cache = Arc::new(EvaluationCache::new(
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
            Arc::new(SystemClock),
        ));

        Ok(Self {
            config,
            store,
            llm,
            llm_config,
            http_client,
            eval_cache,
        })
    }
}
