//! Configuration management
//!
//! The configuration is read from the environment once at startup and
//! passed explicitly to every component; there is no global instance.

use crate::error::{DocChatError, Result};
use serde::{Deserialize, Serialize};

/// Vector store API generation, selects the heartbeat path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreApi {
    V1,
    V2,
}

impl VectorStoreApi {
    pub fn heartbeat_path(&self) -> &'static str {
        match self {
            VectorStoreApi::V1 => "/api/v1/heartbeat",
            VectorStoreApi::V2 => "/api/v2/heartbeat",
        }
    }

    pub fn base_path(&self) -> &'static str {
        match self {
            VectorStoreApi::V1 => "/api/v1",
            VectorStoreApi::V2 => "/api/v2",
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Embedding model identifier
    pub embedding_model: String,

    /// Chat model identifier
    pub chat_model: String,

    /// Embedding vector dimensionality
    pub embedding_dimensions: usize,

    /// Raw chunk target size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive raw chunks in characters
    pub chunk_overlap: usize,

    /// Maximum context passages handed to the LLM per question
    pub max_chunks: usize,

    /// Minimum relevancy for a passage to be cited
    pub citation_threshold: f32,

    /// Search cache capacity (result sets)
    pub search_cache_capacity: usize,

    /// Search cache TTL in seconds
    pub search_cache_ttl_secs: u64,

    /// Vector store base URL
    pub vector_store_url: String,

    /// Vector store API generation (heartbeat path)
    pub vector_store_api: VectorStoreApi,

    /// LLM service base URL (OpenAI-compatible)
    pub llm_url: String,

    /// Bearer key for the embeddings endpoint
    #[serde(default)]
    pub embedding_api_key: Option<String>,

    /// Bearer key for the chat endpoint
    #[serde(default)]
    pub llm_api_key: Option<String>,

    /// Parallel summarize-and-embed tasks per document
    pub summary_concurrency: usize,

    /// Deterministic stub clients instead of live services
    pub demo_mode: bool,

    /// Embedding request timeout in seconds
    pub embed_timeout_secs: u64,

    /// LLM request wall-clock timeout in seconds
    pub llm_timeout_secs: u64,

    /// Vector store request timeout in seconds
    pub store_timeout_secs: u64,

    /// Maximum inputs per upstream embedding call
    pub embed_batch_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-ada-002".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_dimensions: 1536,
            chunk_size: 1000,
            chunk_overlap: 100,
            max_chunks: 15,
            citation_threshold: 0.40,
            search_cache_capacity: 1000,
            search_cache_ttl_secs: 3600,
            vector_store_url: "http://localhost:8002".to_string(),
            vector_store_api: VectorStoreApi::V2,
            llm_url: "https://api.openai.com".to_string(),
            embedding_api_key: None,
            llm_api_key: None,
            summary_concurrency: 4,
            demo_mode: false,
            embed_timeout_secs: 30,
            llm_timeout_secs: 60,
            store_timeout_secs: 15,
            embed_batch_limit: 96,
        }
    }
}

impl Config {
    /// Build configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            embedding_model: env_or("EMBEDDING_MODEL", defaults.embedding_model),
            chat_model: env_or("CHAT_MODEL", defaults.chat_model),
            embedding_dimensions: env_parse("EMBEDDING_DIMENSIONS", defaults.embedding_dimensions),
            chunk_size: env_parse("CHUNK_SIZE", defaults.chunk_size),
            chunk_overlap: env_parse("CHUNK_OVERLAP", defaults.chunk_overlap),
            max_chunks: env_parse("MAX_CHUNKS", defaults.max_chunks),
            citation_threshold: env_parse("CITATION_THRESHOLD", defaults.citation_threshold),
            search_cache_capacity: env_parse(
                "SEARCH_CACHE_CAPACITY",
                defaults.search_cache_capacity,
            ),
            search_cache_ttl_secs: env_parse(
                "SEARCH_CACHE_TTL_SEC",
                defaults.search_cache_ttl_secs,
            ),
            vector_store_url: env_or("VECTOR_STORE_URL", defaults.vector_store_url),
            vector_store_api: match std::env::var("VECTOR_STORE_API").as_deref() {
                Ok("v1") => VectorStoreApi::V1,
                _ => VectorStoreApi::V2,
            },
            llm_url: env_or("LLM_URL", defaults.llm_url),
            embedding_api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            llm_api_key: std::env::var("LLM_API_KEY").ok(),
            summary_concurrency: env_parse("SUMMARY_CONCURRENCY", defaults.summary_concurrency),
            demo_mode: std::env::var("DEMO_MODE")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            embed_timeout_secs: defaults.embed_timeout_secs,
            llm_timeout_secs: defaults.llm_timeout_secs,
            store_timeout_secs: defaults.store_timeout_secs,
            embed_batch_limit: defaults.embed_batch_limit,
        }
    }

    /// Validate the configuration, collecting every violation
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.chunk_size == 0 {
            errors.push("chunk size must be positive".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            errors.push("chunk overlap must be less than chunk size".to_string());
        }
        if !(0.0..=1.0).contains(&self.citation_threshold) {
            errors.push("citation threshold must be within [0, 1]".to_string());
        }
        if self.search_cache_capacity == 0 {
            errors.push("search cache capacity must be positive".to_string());
        }
        if self.summary_concurrency == 0 {
            errors.push("summary concurrency must be positive".to_string());
        }
        if self.embedding_dimensions == 0 {
            errors.push("embedding dimensions must be positive".to_string());
        }
        if !self.demo_mode && self.llm_api_key.is_none() && self.embedding_api_key.is_none() {
            errors.push(
                "an API key is required unless DEMO_MODE is set (LLM_API_KEY / EMBEDDING_API_KEY)"
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocChatError::Config(errors.join("; ")))
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.citation_threshold, 0.40);
        assert_eq!(config.search_cache_capacity, 1000);
        assert_eq!(config.vector_store_api, VectorStoreApi::V2);
    }

    #[test]
    fn test_validate_rejects_bad_chunking() {
        let config = Config {
            chunk_size: 100,
            chunk_overlap: 100,
            demo_mode: true,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_demo_mode_needs_no_keys() {
        let config = Config {
            demo_mode: true,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_heartbeat_paths() {
        assert_eq!(VectorStoreApi::V1.heartbeat_path(), "/api/v1/heartbeat");
        assert_eq!(VectorStoreApi::V2.heartbeat_path(), "/api/v2/heartbeat");
    }
}
