//! vrag RAG - Retrieval pipeline
//!
//! This crate composes the two retrieval stages:
//! - Ingestion: chunk, embed, and batch-upsert text with access metadata
//! - Query: embed the question, run access-filtered similarity search,
//!   then re-rank candidates by cosine similarity to the question
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;
use vrag_core::{
    ChunkMetadata, RankedPassage, Result, RetrievalConfig, UserContext, VragError,
};
use vrag_vector::{DocumentIndex, EmbeddingClient};

pub mod chunker;
pub mod rerank;

pub use chunker::chunk_text;
pub use rerank::Reranker;

// ============================================================================
// Retrieval Pipeline
// ============================================================================

/// Ingestion and query over one document index
pub struct RetrievalPipeline {
    /// Collection of embedded chunks
    index: DocumentIndex,

    /// Embedding client shared by ingestion, search and re-rank
    embedder: Arc<dyn EmbeddingClient>,

    /// Second-pass ranker
    reranker: Reranker,

    /// Configuration
    config: RetrievalConfig,
}

impl RetrievalPipeline {
    /// Create a new pipeline
    pub fn new(
        index: DocumentIndex,
        embedder: Arc<dyn EmbeddingClient>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            reranker: Reranker::new(embedder.clone()),
            embedder,
            config,
        }
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Embed chunk texts and store them with their metadata
    pub async fn ingest_texts(
        &self,
        texts: &[String],
        metadata: &[ChunkMetadata],
    ) -> Result<Vec<Uuid>> {
        if texts.len() != metadata.len() {
            return Err(VragError::ValidationError(format!(
                "chunk and metadata counts differ ({}, {})",
                texts.len(),
                metadata.len()
            )));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed_batch(texts).await?;
        let ids = self
            .index
            .upsert_text_chunks(texts, &embeddings, metadata)
            .await?;

        tracing::info!(chunks = ids.len(), "Chunks ingested");
        Ok(ids)
    }

    /// Chunk a document and ingest every chunk with the same metadata
    pub async fn ingest_document(
        &self,
        text: &str,
        metadata: &ChunkMetadata,
    ) -> Result<Vec<Uuid>> {
        let chunks = chunk_text(text, self.config.chunk_size, self.config.chunk_overlap);
        tracing::debug!(chunks = chunks.len(), "Document chunked");

        let metadata = vec![metadata.clone(); chunks.len()];
        self.ingest_texts(&chunks, &metadata).await
    }

    /// Answer-free retrieval: search with the configured candidate count,
    /// then keep the configured number of re-ranked passages
    pub async fn query(&self, question: &str, user: &UserContext) -> Result<Vec<RankedPassage>> {
        self.query_with(
            question,
            user,
            self.config.search_top_k,
            self.config.rerank_top_k,
        )
        .await
    }

    /// Query with explicit candidate and final counts
    pub async fn query_with(
        &self,
        question: &str,
        user: &UserContext,
        search_top_k: usize,
        rerank_top_k: usize,
    ) -> Result<Vec<RankedPassage>> {
        let start_time = Instant::now();

        let query_vector = self.embedder.embed(question).await?;
        let candidates = self
            .index
            .filtered_search(&query_vector, user, search_top_k)
            .await?;
        tracing::debug!(candidates = candidates.len(), "Filtered search returned");

        let ranked = self
            .reranker
            .rerank(question, candidates, rerank_top_k)
            .await?;

        tracing::info!(
            results = ranked.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Query completed"
        );

        Ok(ranked)
    }
}
