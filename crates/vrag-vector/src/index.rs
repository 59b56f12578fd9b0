//! Document index over a vector backend
//!
//! Provisions the collection and its payload indexes, ingests embedded
//! chunks, and runs access-filtered similarity search.
//!
//! Author: hephaex@gmail.com

use crate::{DocumentPoint, VectorBackend, PAYLOAD_INDEXES};
use std::sync::Arc;
use uuid::Uuid;
use vrag_core::{
    ChunkMetadata, ChunkPayload, Passage, Result, StoreConfig, UserContext, VragError,
};

/// Result of provisioning the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Collection did not exist and was created
    Created,
    /// Collection existed with the expected vector size
    AlreadyPresent,
    /// Collection existed with another vector size and was dropped and
    /// created again; all previous points are gone
    Recreated { previous_size: u64 },
    /// Collection is listed but its vector size could not be checked
    Unverified { reason: String },
    /// Provisioning did not complete
    Failed { reason: String },
}

impl EnsureOutcome {
    /// Whether the collection can be read from and written to
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AlreadyPresent => write!(f, "already present"),
            Self::Recreated { previous_size } => {
                write!(f, "recreated (previous vector size {previous_size})")
            }
            Self::Unverified { reason } => write!(f, "present, size unverified: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Collection of embedded document chunks
#[derive(Clone)]
pub struct DocumentIndex {
    backend: Arc<dyn VectorBackend>,
    collection: String,
    vector_size: u64,
}

impl DocumentIndex {
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        collection: impl Into<String>,
        vector_size: u64,
    ) -> Self {
        Self {
            backend,
            collection: collection.into(),
            vector_size,
        }
    }

    /// Create from store config
    pub fn from_config(backend: Arc<dyn VectorBackend>, config: &StoreConfig) -> Self {
        Self::new(backend, config.collection.clone(), config.vector_size)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn vector_size(&self) -> u64 {
        self.vector_size
    }

    /// Make sure the collection exists with the configured vector size and
    /// that every payload index used by filtered search is declared
    ///
    /// Safe to call on every startup. A size mismatch drops the collection
    /// and all of its points.
    pub async fn ensure_collection(&self) -> EnsureOutcome {
        let existing = match self.backend.list_collections().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list collections");
                return EnsureOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        if !existing.iter().any(|name| name == &self.collection) {
            return match self.create_with_indexes().await {
                Ok(()) => {
                    tracing::info!(
                        collection = %self.collection,
                        size = self.vector_size,
                        "Collection created"
                    );
                    EnsureOutcome::Created
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %self.collection,
                        error = %e,
                        "Collection creation failed"
                    );
                    EnsureOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
        }

        self.ensure_payload_indexes().await;

        match self.backend.collection_vector_size(&self.collection).await {
            Ok(Some(size)) if size != self.vector_size => {
                tracing::warn!(
                    collection = %self.collection,
                    current = size,
                    expected = self.vector_size,
                    "Vector size mismatch, recreating collection"
                );
                match self.recreate().await {
                    Ok(()) => EnsureOutcome::Recreated {
                        previous_size: size,
                    },
                    Err(e) => EnsureOutcome::Failed {
                        reason: format!("recreate after size mismatch failed: {e}"),
                    },
                }
            }
            Ok(_) => {
                tracing::debug!(collection = %self.collection, "Collection already present");
                EnsureOutcome::AlreadyPresent
            }
            Err(inspect_err) => {
                tracing::warn!(
                    error = %inspect_err,
                    "Collection inspection failed, attempting create"
                );
                // The collection was listed, so a rejected create leaves it usable
                match self.create_with_indexes().await {
                    Ok(()) => EnsureOutcome::Created,
                    Err(create_err) => {
                        tracing::debug!(error = %create_err, "Fallback create rejected");
                        EnsureOutcome::Unverified {
                            reason: inspect_err.to_string(),
                        }
                    }
                }
            }
        }
    }

    async fn create_with_indexes(&self) -> Result<()> {
        self.backend
            .create_collection(&self.collection, self.vector_size)
            .await?;
        self.ensure_payload_indexes().await;
        Ok(())
    }

    async fn recreate(&self) -> Result<()> {
        self.backend.delete_collection(&self.collection).await?;
        self.create_with_indexes().await
    }

    /// Declare payload indexes, ignoring failures (typically "already exists")
    async fn ensure_payload_indexes(&self) {
        for (field, kind) in PAYLOAD_INDEXES {
            if let Err(e) = self
                .backend
                .create_payload_index(&self.collection, field, kind)
                .await
            {
                tracing::debug!(field, error = %e, "Payload index not created");
            }
        }
    }

    /// Store embedded chunks in a single batch write
    ///
    /// `chunks`, `embeddings` and `metadata` are positionally aligned and
    /// must have the same length. Returns the generated point ids in input
    /// order.
    pub async fn upsert_text_chunks(
        &self,
        chunks: &[String],
        embeddings: &[Vec<f32>],
        metadata: &[ChunkMetadata],
    ) -> Result<Vec<Uuid>> {
        if chunks.len() != embeddings.len() || chunks.len() != metadata.len() {
            return Err(VragError::ValidationError(format!(
                "chunk, embedding and metadata counts differ ({}, {}, {})",
                chunks.len(),
                embeddings.len(),
                metadata.len()
            )));
        }

        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut points = Vec::with_capacity(chunks.len());
        for ((text, vector), meta) in chunks.iter().zip(embeddings).zip(metadata) {
            if vector.len() as u64 != self.vector_size {
                return Err(VragError::ValidationError(format!(
                    "embedding has {} dimensions, collection expects {}",
                    vector.len(),
                    self.vector_size
                )));
            }
            meta.validate()?;

            points.push(DocumentPoint {
                id: Uuid::new_v4(),
                vector: vector.clone(),
                payload: ChunkPayload::new(text.clone(), meta.clone()),
            });
        }

        let ids: Vec<Uuid> = points.iter().map(|p| p.id).collect();
        self.backend.upsert_points(&self.collection, points).await?;

        tracing::debug!(collection = %self.collection, count = ids.len(), "Chunks upserted");
        Ok(ids)
    }

    /// Similarity search restricted to chunks the user may read
    ///
    /// Returns at most `top_k` passages in the store's ranking order.
    pub async fn filtered_search(
        &self,
        query_vector: &[f32],
        user: &UserContext,
        top_k: usize,
    ) -> Result<Vec<Passage>> {
        let hits = self
            .backend
            .search(&self.collection, query_vector, user, top_k)
            .await?;

        tracing::debug!(count = hits.len(), "Filtered search completed");

        Ok(hits.into_iter().map(|hit| Passage::from(hit.payload)).collect())
    }
}
