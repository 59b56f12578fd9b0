//! In-process vector store
//!
//! Brute-force cosine search over points held in memory, applying the same
//! access filter the Qdrant backend sends to the server. Used by tests and
//! by dry runs that should not touch a real cluster.

use crate::{DocumentPoint, PayloadFieldKind, StoreHit, VectorBackend};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use vrag_core::{Result, UserContext, VragError};

#[derive(Debug, Default)]
struct Collection {
    vector_size: u64,
    indexes: BTreeMap<String, PayloadFieldKind>,
    points: Vec<DocumentPoint>,
}

/// In-memory vector store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<BTreeMap<String, Collection>>,
    fail_index_creation: AtomicBool,
    fail_inspection: AtomicBool,
    upsert_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every payload index creation fail, as a store that rejects
    /// duplicate indexes would
    pub fn fail_index_creation(&self, fail: bool) {
        self.fail_index_creation.store(fail, Ordering::SeqCst);
    }

    /// Make collection inspection fail
    pub fn fail_inspection(&self, fail: bool) {
        self.fail_inspection.store(fail, Ordering::SeqCst);
    }

    /// Number of points in a collection, `None` if it does not exist
    pub async fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
    }

    /// Declared payload indexes of a collection
    pub async fn indexes(&self, collection: &str) -> Vec<(String, PayloadFieldKind)> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.indexes.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorBackend for InMemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn collection_vector_size(&self, collection: &str) -> Result<Option<u64>> {
        if self.fail_inspection.load(Ordering::SeqCst) {
            return Err(VragError::DatabaseError(
                "Failed to get collection info: injected failure".to_string(),
            ));
        }

        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| Some(c.vector_size))
            .ok_or_else(|| VragError::DatabaseError(format!("Collection {collection} not found")))
    }

    async fn create_collection(&self, collection: &str, vector_size: u64) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            return Err(VragError::DatabaseError(format!(
                "Collection {collection} already exists"
            )));
        }

        collections.insert(
            collection.to_string(),
            Collection {
                vector_size,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn create_payload_index(
        &self,
        collection: &str,
        field: &str,
        kind: PayloadFieldKind,
    ) -> Result<()> {
        if self.fail_index_creation.load(Ordering::SeqCst) {
            return Err(VragError::DatabaseError(format!(
                "Failed to create payload index {field}: injected failure"
            )));
        }

        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VragError::DatabaseError(format!("Collection {collection} not found")))?;
        target.indexes.insert(field.to_string(), kind);
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<DocumentPoint>) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VragError::DatabaseError(format!("Collection {collection} not found")))?;

        if let Some(bad) = points
            .iter()
            .find(|p| p.vector.len() as u64 != target.vector_size)
        {
            return Err(VragError::DatabaseError(format!(
                "Wrong vector dimension for point {}: expected {}, got {}",
                bad.id,
                target.vector_size,
                bad.vector.len()
            )));
        }

        let incoming: HashSet<_> = points.iter().map(|p| p.id).collect();
        target.points.retain(|p| !incoming.contains(&p.id));
        target.points.extend(points);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        user: &UserContext,
        limit: usize,
    ) -> Result<Vec<StoreHit>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VragError::SearchError(format!("Collection {collection} not found")))?;

        let mut hits: Vec<StoreHit> = target
            .points
            .iter()
            .filter(|p| user.permits(&p.payload.metadata))
            .map(|p| StoreHit {
                id: p.id.to_string(),
                score: cosine(query_vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
