use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the JSON chunk store written by the ingestion pipeline
    pub store_path: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Retrieval fan-out knobs
    pub retrieval: RetrievalConfig,
    /// Evaluation cache knobs
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for triage/checklist/rubric calls
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
}

/// Configuration for the cross-encoder reranker sidecar (e.g. llama-server
/// with a pairwise relevance model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    /// If None, reranking falls back to insertion order.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results requested per fan-out branch before dedup
    pub fetch_k: usize,
    /// Candidates kept after reranking
    pub top_n: usize,
    /// Concurrent fan-out branches
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds before a cached evaluation is considered stale
    pub ttl_secs: u64,
    /// Maximum cached (question, answer) pairs before LRU eviction
    pub capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./data/chunks.json"),
            bind_addr: "127.0.0.1:9100".to_string(),
            llm: LlmConfig::default(),
            reranker: RerankerConfig::default(),
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fetch_k: 10,
            top_n: 5,
            concurrency: 4,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 1800,
            capacity: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("GRADER_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Ok(addr) = std::env::var("GRADER_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.to_lowercase();
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }

        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Ok(val) = std::env::var("RERANKER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.reranker.timeout_secs = v.min(30); // Cap at 30s
            }
        }

        if let Ok(val) = std::env::var("RETRIEVAL_FETCH_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.fetch_k = v;
            }
        }
        if let Ok(val) = std::env::var("RETRIEVAL_TOP_N") {
            if let Ok(v) = val.parse() {
                config.retrieval.top_n = v;
            }
        }
        if let Ok(val) = std::env::var("RETRIEVAL_CONCURRENCY") {
            if let Ok(v) = val.parse::<usize>() {
                config.retrieval.concurrency = v.max(1);
            }
        }

        if let Ok(val) = std::env::var("EVAL_CACHE_TTL_SECS") {
            if let Ok(v) = val.parse() {
                config.cache.ttl_secs = v;
            }
        }
        if let Ok(val) = std::env::var("EVAL_CACHE_CAPACITY") {
            if let Ok(v) = val.parse::<usize>() {
                config.cache.capacity = v.max(1);
            }
        }

        config
    }
}
