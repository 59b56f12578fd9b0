//! vrag Configuration Management
//!
//! Handles configuration from environment variables and TOML config files,
//! with defaults matching the fixed collection schema.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Vector store connection
    pub store: StoreConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Search and re-rank configuration
    pub retrieval: RetrievalConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    ///
    /// Keys use the environment variable names (`QDRANT_URL`, `LOG_LEVEL`, ...).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Qdrant
        if let Some(url) = lookup("QDRANT_URL").filter(|u| !u.trim().is_empty()) {
            self.store.url = Some(url);
        }
        if let Some(key) = lookup("QDRANT_API_KEY").filter(|k| !k.is_empty()) {
            self.store.api_key = Some(key);
        }
        if let Some(collection) = lookup("QDRANT_COLLECTION") {
            self.store.collection = collection;
        }

        // Embeddings
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) {
            self.embedding.gemini_api_key = Some(key);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.ollama_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = Some(model).filter(|m| !m.is_empty());
        }

        // Retrieval
        if let Some(k) = lookup("SEARCH_TOP_K") {
            self.retrieval.search_top_k = parse_value("SEARCH_TOP_K", k)?;
        }
        if let Some(k) = lookup("RERANK_TOP_K") {
            self.retrieval.rerank_top_k = parse_value("RERANK_TOP_K", k)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format =
                matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(self)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Vector store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Qdrant endpoint URL (required)
    pub url: Option<String>,

    /// Qdrant API key
    pub api_key: Option<String>,

    /// Collection name
    pub collection: String,

    /// Vector dimension (must match embedding model)
    pub vector_size: u64,

    /// Client timeout in seconds
    pub timeout_secs: u64,

    /// Keep payloads on disk rather than in RAM
    pub on_disk_payload: bool,
}

impl StoreConfig {
    /// The configured endpoint, or a fatal error if unset
    pub fn require_url(&self) -> Result<&str, ConfigError> {
        self.url.as_deref().ok_or_else(|| {
            ConfigError::MissingRequired(
                "QDRANT_URL must be set to a Qdrant gRPC endpoint \
                 (e.g., https://<cluster>.cloud.qdrant.io:6334)"
                    .to_string(),
            )
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            collection: crate::DEFAULT_COLLECTION.to_string(),
            vector_size: crate::VECTOR_SIZE,
            timeout_secs: 30,
            on_disk_payload: true,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider to use
    pub provider: EmbeddingProvider,

    /// Google Generative Language API key
    pub gemini_api_key: Option<String>,

    /// Google Generative Language API base URL
    pub gemini_base_url: String,

    /// Ollama server URL
    pub ollama_url: String,

    /// Embedding model name; unset means the provider's default
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Gemini,
            gemini_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: None,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    /// Configured model, falling back to the provider's default
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Gemini,
    Ollama,
}

impl EmbeddingProvider {
    /// 768-dimension model served by the provider
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "text-embedding-004",
            Self::Ollama => "nomic-embed-text",
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Search and re-rank configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates fetched by filtered search
    pub search_top_k: usize,

    /// Passages kept after re-ranking
    pub rerank_top_k: usize,

    /// Chunk size in characters for document ingestion
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_top_k: 20,
            rerank_top_k: 5,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store.collection, "documents");
        assert_eq!(config.store.vector_size, 768);
        assert_eq!(config.store.timeout_secs, 30);
        assert_eq!(config.retrieval.search_top_k, 20);
        assert_eq!(config.retrieval.rerank_top_k, 5);
    }

    #[test]
    fn test_missing_url_is_fatal() {
        let config = AppConfig::default();
        assert!(matches!(
            config.store.require_url(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_overrides_applied() {
        let config = AppConfig::default()
            .with_overrides(lookup(&[
                ("QDRANT_URL", "https://cluster.cloud.qdrant.io"),
                ("QDRANT_API_KEY", "secret"),
                ("EMBEDDING_PROVIDER", "ollama"),
                ("SEARCH_TOP_K", "50"),
                ("LOG_JSON", "true"),
            ]))
            .unwrap();

        assert_eq!(
            config.store.require_url().unwrap(),
            "https://cluster.cloud.qdrant.io"
        );
        assert_eq!(config.store.api_key.as_deref(), Some("secret"));
        assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
        assert_eq!(config.retrieval.search_top_k, 50);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_empty_api_key_ignored() {
        let config = AppConfig::default()
            .with_overrides(lookup(&[
                ("QDRANT_URL", "http://localhost:6334"),
                ("QDRANT_API_KEY", ""),
            ]))
            .unwrap();
        assert!(config.store.api_key.is_none());
    }

    #[test]
    fn test_model_defaults_follow_provider() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.model_name(), "text-embedding-004");

        let config = AppConfig::default()
            .with_overrides(lookup(&[("EMBEDDING_PROVIDER", "ollama")]))
            .unwrap();
        assert_eq!(config.embedding.model_name(), "nomic-embed-text");

        let config = AppConfig::default()
            .with_overrides(lookup(&[
                ("EMBEDDING_PROVIDER", "ollama"),
                ("EMBEDDING_MODEL", "mxbai-embed-large"),
            ]))
            .unwrap();
        assert_eq!(config.embedding.model_name(), "mxbai-embed-large");
    }

    #[test]
    fn test_missing_url_hint_names_grpc_port() {
        let store = StoreConfig::default();
        let Err(ConfigError::MissingRequired(hint)) = store.require_url() else {
            panic!("expected missing url");
        };
        assert!(hint.contains(":6334"));
    }

    #[test]
    fn test_google_api_key_fallback() {
        let config = AppConfig::default()
            .with_overrides(lookup(&[("GOOGLE_API_KEY", "g-key")]))
            .unwrap();
        assert_eq!(config.embedding.gemini_api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::default()
            .with_overrides(lookup(&[("SEARCH_TOP_K", "many")]))
            .is_err());
        assert!(AppConfig::default()
            .with_overrides(lookup(&[("EMBEDDING_PROVIDER", "invalid")]))
            .is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [store]
            url = "http://localhost:6334"

            [retrieval]
            rerank_top_k = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.store.url.as_deref(), Some("http://localhost:6334"));
        assert_eq!(config.store.collection, "documents");
        assert_eq!(config.retrieval.rerank_top_k, 3);
        assert_eq!(config.retrieval.search_top_k, 20);
    }

    #[test]
    fn test_embedding_provider_parse() {
        assert_eq!(
            "gemini".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Gemini
        );
        assert_eq!(
            "Ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
    }
}
