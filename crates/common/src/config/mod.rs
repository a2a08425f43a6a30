//! Configuration management for AskForge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (semantic index persistence)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres URL. When absent the semantic index lives in memory.
    pub url: Option<String>,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension override; derived from the model when absent
    pub dimension: Option<usize>,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Completion provider: openai, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature. Zero keeps outputs reproducible.
    #[serde(default)]
    pub temperature: f32,

    /// Output budget for answer synthesis
    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: u32,

    /// Output budget for answer scoring
    #[serde(default = "default_evaluation_max_tokens")]
    pub evaluation_max_tokens: u32,

    /// Output budget for clarity rewrites
    #[serde(default = "default_rewrite_max_tokens")]
    pub rewrite_max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Stable identifier of the persisted chunk collection
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Number of chunks retrieved for the first answer
    #[serde(default = "default_initial_k")]
    pub initial_k: usize,

    /// Number of chunks retrieved when relevance is low
    #[serde(default = "default_expanded_k")]
    pub expanded_k: usize,

    /// Chunk snapshot (JSON array or JSON Lines) inserted at startup
    #[serde(default)]
    pub chunks_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, askforge_agent=debug)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name reported in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-large".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_upstream_timeout() -> u64 { 30 }
fn default_answer_max_tokens() -> u32 { 300 }
fn default_evaluation_max_tokens() -> u32 { 150 }
fn default_rewrite_max_tokens() -> u32 { 200 }
fn default_collection() -> String { "askforge".to_string() }
fn default_initial_k() -> usize { 3 }
fn default_expanded_k() -> usize { 6 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "askforge".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: None,
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            timeout_secs: default_upstream_timeout(),
            temperature: 0.0,
            answer_max_tokens: default_answer_max_tokens(),
            evaluation_max_tokens: default_evaluation_max_tokens(),
            rewrite_max_tokens: default_rewrite_max_tokens(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            initial_k: default_initial_k(),
            expanded_k: default_expanded_k(),
            chunks_path: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__LLM__MODEL=gpt-4o
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        let retrieval = &self.retrieval;
        if retrieval.initial_k == 0 || retrieval.expanded_k == 0 {
            return Err(AppError::Configuration {
                message: "retrieval k values must be greater than zero".to_string(),
            });
        }
        if retrieval.expanded_k < retrieval.initial_k {
            return Err(AppError::Configuration {
                message: format!(
                    "retrieval.expanded_k ({}) must not be smaller than retrieval.initial_k ({})",
                    retrieval.expanded_k, retrieval.initial_k
                ),
            });
        }
        if retrieval.collection.trim().is_empty() {
            return Err(AppError::Configuration {
                message: "retrieval.collection must not be empty".to_string(),
            });
        }
        if self.embedding.provider == "openai" && self.embedding.api_key.is_none() {
            return Err(AppError::Configuration {
                message: "embedding.api_key is required for the openai provider".to_string(),
            });
        }
        if self.llm.provider == "openai" && self.llm.api_key.is_none() {
            return Err(AppError::Configuration {
                message: "llm.api_key is required for the openai provider".to_string(),
            });
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.embedding.provider = "mock".to_string();
        config.llm.provider = "mock".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.retrieval.initial_k, 3);
        assert_eq!(config.retrieval.expanded_k, 6);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.answer_max_tokens, 300);
        assert_eq!(config.embedding.model, "text-embedding-3-large");
    }

    #[test]
    fn test_offline_config_is_valid() {
        assert!(offline_config().validate().is_ok());
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_expanded_k_must_cover_initial_k() {
        let mut config = offline_config();
        config.retrieval.expanded_k = 2;
        assert!(config.validate().is_err());

        config.retrieval.expanded_k = 0;
        assert!(config.validate().is_err());
    }
}
