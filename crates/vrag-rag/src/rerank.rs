//! Embedding re-ranker
//!
//! Re-scores search candidates by embedding the query together with every
//! passage and ranking passages by cosine similarity to the query.
//!
//! Author: hephaex@gmail.com

use ndarray::{Array1, Array2};
use std::sync::Arc;
use vrag_core::{Passage, RankedPassage, Result, VragError};
use vrag_vector::EmbeddingClient;

/// Second-pass ranker over a coarse candidate set
#[derive(Clone)]
pub struct Reranker {
    embedder: Arc<dyn EmbeddingClient>,
}

impl Reranker {
    pub fn new(embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { embedder }
    }

    /// Rank passages by similarity to the query and keep the best `top_k`
    ///
    /// Makes a single embedding call with the query first and the passage
    /// texts after it in input order. An empty passage list returns
    /// immediately without calling the embedder. Equal scores keep their
    /// input order.
    pub async fn rerank(
        &self,
        query: &str,
        passages: Vec<Passage>,
        top_k: usize,
    ) -> Result<Vec<RankedPassage>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let mut inputs = Vec::with_capacity(passages.len() + 1);
        inputs.push(query.to_string());
        inputs.extend(passages.iter().map(|p| p.text.clone()));

        let vectors = self.embedder.embed_batch(&inputs).await?;
        if vectors.len() != inputs.len() {
            return Err(VragError::EmbeddingError(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }

        let scores = similarities(&vectors[0], &vectors[1..])?;
        let order = rank_order(&scores);

        let mut slots: Vec<Option<Passage>> = passages.into_iter().map(Some).collect();
        let ranked: Vec<RankedPassage> = order
            .into_iter()
            .take(top_k)
            .filter_map(|i| {
                slots[i].take().map(|passage| RankedPassage {
                    passage,
                    score: scores[i],
                })
            })
            .collect();

        tracing::debug!(
            candidates = scores.len(),
            kept = ranked.len(),
            "Passages re-ranked"
        );

        Ok(ranked)
    }
}

/// Dot product of every document vector against the query vector
///
/// Vectors are expected to be unit-normalized, which makes the dot product
/// the cosine similarity.
pub fn similarities(query: &[f32], docs: &[Vec<f32>]) -> Result<Vec<f32>> {
    let dim = query.len();
    if let Some(bad) = docs.iter().find(|d| d.len() != dim) {
        return Err(VragError::EmbeddingError(format!(
            "embedding dimension mismatch: query has {dim}, passage has {}",
            bad.len()
        )));
    }

    let flat: Vec<f32> = docs.iter().flatten().copied().collect();
    let docs = Array2::from_shape_vec((docs.len(), dim), flat)
        .map_err(|e| VragError::EmbeddingError(format!("invalid embedding matrix: {e}")))?;
    let q = Array1::from_vec(query.to_vec());

    Ok(docs.dot(&q).to_vec())
}

/// Indices sorted by score, highest first; ties keep ascending index order
pub fn rank_order(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // sort_by is stable
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vrag_core::{ChunkMetadata, ChunkPayload};

    /// Embeds known texts to fixed unit vectors and counts calls
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for TableEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            texts
                .iter()
                .map(|t| {
                    self.table
                        .get(t)
                        .cloned()
                        .ok_or_else(|| VragError::EmbeddingError(format!("unknown text {t}")))
                })
                .collect()
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Unit vector whose dot product with [1, 0] is `sim`
    fn at(sim: f32) -> Vec<f32> {
        vec![sim, (1.0 - sim * sim).sqrt()]
    }

    fn passage(text: &str) -> Passage {
        Passage::from(ChunkPayload::new(
            text,
            ChunkMetadata::new(1, "eng", "x", "member"),
        ))
    }

    #[tokio::test]
    async fn test_empty_passages_skip_embedding() {
        let embedder = Arc::new(TableEmbedder::new(&[]));
        let reranker = Reranker::new(embedder.clone());

        let ranked = reranker.rerank("q", Vec::new(), 5).await.unwrap();
        assert!(ranked.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerank_orders_by_similarity() {
        let embedder = Arc::new(TableEmbedder::new(&[
            ("q", vec![1.0, 0.0]),
            ("high", at(0.9)),
            ("low", at(0.1)),
            ("mid", at(0.5)),
        ]));
        let reranker = Reranker::new(embedder.clone());

        let ranked = reranker
            .rerank(
                "q",
                vec![passage("high"), passage("low"), passage("mid")],
                2,
            )
            .await
            .unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].passage.text, "high");
        assert!((ranked[0].score - 0.9).abs() < 1e-5);
        assert_eq!(ranked[1].passage.text, "mid");
        assert!((ranked[1].score - 0.5).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_top_k_larger_than_candidates() {
        let embedder = Arc::new(TableEmbedder::new(&[
            ("q", vec![1.0, 0.0]),
            ("a", at(0.2)),
        ]));
        let ranked = Reranker::new(embedder)
            .rerank("q", vec![passage("a")], 5)
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let embedder = Arc::new(TableEmbedder::new(&[("q", vec![1.0, 0.0])]));
        let result = Reranker::new(embedder)
            .rerank("q", vec![passage("missing")], 5)
            .await;
        assert!(matches!(result, Err(VragError::EmbeddingError(_))));
    }

    #[test]
    fn test_similarities_dimension_mismatch() {
        let result = similarities(&[1.0, 0.0], &[vec![1.0, 0.0, 0.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rank_order_ties_keep_input_order() {
        assert_eq!(rank_order(&[0.5, 0.9, 0.5, 0.9]), vec![1, 3, 0, 2]);
    }

    proptest! {
        #[test]
        fn prop_rank_order_is_descending_permutation(
            scores in proptest::collection::vec(-1.0f32..1.0, 0..32)
        ) {
            let order = rank_order(&scores);

            let mut seen = order.clone();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..scores.len()).collect::<Vec<_>>());

            for pair in order.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(scores[a] >= scores[b]);
                if scores[a].total_cmp(&scores[b]).is_eq() {
                    prop_assert!(a < b);
                }
            }
        }
    }
}
