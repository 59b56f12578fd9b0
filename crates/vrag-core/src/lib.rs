//! vrag Core - Domain models, configuration, and shared types
//!
//! This crate defines the core abstractions used throughout vrag:
//! - Chunk payload records stored alongside each vector
//! - Caller identity used for access-filtered search
//! - Common error types
//! - Configuration management
//!
//! Author: hephaex@gmail.com

pub mod access;
pub mod config;
pub mod payload;

pub use access::UserContext;
pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, LoggingConfig, RetrievalConfig,
    StoreConfig,
};
pub use payload::{AllowRoles, ChunkMetadata, ChunkPayload, Passage, RankedPassage};

use thiserror::Error;

// ============================================================================
// Schema Constants
// ============================================================================

/// Output size of the embedding model (Gemini text-embedding-004)
pub const VECTOR_SIZE: u64 = 768;

/// Default collection holding document chunks
pub const DEFAULT_COLLECTION: &str = "documents";

/// Payload key holding the original chunk text
pub const TEXT_KEY: &str = "text";
pub const UPLOADER_LEVEL_KEY: &str = "uploader_level";
pub const DEPT_KEY: &str = "dept";
pub const PROJECT_KEY: &str = "project";
pub const ALLOW_ROLES_KEY: &str = "allow_roles";

/// Payload keys owned by vrag; caller metadata may not reuse them
pub const RESERVED_PAYLOAD_KEYS: [&str; 5] = [
    TEXT_KEY,
    UPLOADER_LEVEL_KEY,
    DEPT_KEY,
    PROJECT_KEY,
    ALLOW_ROLES_KEY,
];

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for vrag operations
#[derive(Error, Debug)]
pub enum VragError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for VragError {
    fn from(err: ConfigError) -> Self {
        VragError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VragError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_cover_payload_fields() {
        for key in ["text", "uploader_level", "dept", "project", "allow_roles"] {
            assert!(RESERVED_PAYLOAD_KEYS.contains(&key));
        }
    }

    #[test]
    fn test_config_error_conversion() {
        let err: VragError = ConfigError::MissingRequired("QDRANT_URL".to_string()).into();
        assert!(matches!(err, VragError::ConfigError(_)));
        assert!(err.to_string().contains("QDRANT_URL"));
    }
}
