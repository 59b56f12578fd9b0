//! vrag Vector - Vector store and embedding abstraction
//!
//! Provides the backend seam over the vector database (Qdrant, or an
//! in-process store for tests), the document index that provisions the
//! collection, ingests chunks and runs access-filtered search, and the
//! embedding clients that turn text into unit-normalized vectors.

use async_trait::async_trait;
use uuid::Uuid;
use vrag_core::{ChunkPayload, Result, UserContext};

pub mod embedding;
pub mod index;
pub mod memory_store;
pub mod qdrant_store;

pub use embedding::{create_embedding_client, EmbeddingClient, GeminiEmbedding, OllamaEmbedding};
pub use index::{DocumentIndex, EnsureOutcome};
pub use memory_store::InMemoryStore;
pub use qdrant_store::QdrantStore;

/// A vector with its payload, ready to be written
#[derive(Debug, Clone)]
pub struct DocumentPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A point returned by similarity search
#[derive(Debug, Clone)]
pub struct StoreHit {
    pub id: String,
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Schema of a payload index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFieldKind {
    Integer,
    Keyword,
}

/// Payload indexes required by filtered search
pub const PAYLOAD_INDEXES: [(&str, PayloadFieldKind); 4] = [
    (vrag_core::UPLOADER_LEVEL_KEY, PayloadFieldKind::Integer),
    (vrag_core::DEPT_KEY, PayloadFieldKind::Keyword),
    (vrag_core::PROJECT_KEY, PayloadFieldKind::Keyword),
    (vrag_core::ALLOW_ROLES_KEY, PayloadFieldKind::Keyword),
];

/// Trait for vector database operations
///
/// Every method maps to exactly one call against the store.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Names of all collections
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Vector size of a collection, `None` if the store does not report one
    async fn collection_vector_size(&self, collection: &str) -> Result<Option<u64>>;

    /// Create a collection with cosine distance
    async fn create_collection(&self, collection: &str, vector_size: u64) -> Result<()>;

    /// Delete a collection and all of its points
    async fn delete_collection(&self, collection: &str) -> Result<()>;

    /// Declare a queryable payload field
    async fn create_payload_index(
        &self,
        collection: &str,
        field: &str,
        kind: PayloadFieldKind,
    ) -> Result<()>;

    /// Write a batch of points
    async fn upsert_points(&self, collection: &str, points: Vec<DocumentPoint>) -> Result<()>;

    /// Similarity search restricted to points the user may read
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        user: &UserContext,
        limit: usize,
    ) -> Result<Vec<StoreHit>>;
}
