//! Qdrant implementation for vector storage
//!
//! Provides connection management and collection, index, upsert and
//! filtered search operations for document chunk embeddings.
//!
//! Author: hephaex@gmail.com

use crate::{DocumentPoint, PayloadFieldKind, StoreHit, VectorBackend};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, vectors_config, Condition,
    CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeleteCollectionBuilder,
    Distance, FieldType, Filter, PointId, PointStruct, Range, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::time::Duration;
use vrag_core::{
    ChunkPayload, Result, StoreConfig, UserContext, VragError, ALLOW_ROLES_KEY, DEPT_KEY,
    PROJECT_KEY, UPLOADER_LEVEL_KEY,
};

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Qdrant,
    on_disk_payload: bool,
}

impl QdrantStore {
    /// Create a new Qdrant connection
    ///
    /// Fails with a configuration error when no URL is configured.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let url = config.require_url()?;
        let timeout = Duration::from_secs(config.timeout_secs);

        let client = Qdrant::from_url(url)
            .api_key(config.api_key.clone())
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| VragError::DatabaseError(format!("Qdrant connection failed: {e}")))?;

        tracing::debug!(url, "Qdrant client constructed");

        Ok(Self {
            client,
            on_disk_payload: config.on_disk_payload,
        })
    }
}

#[async_trait]
impl VectorBackend for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| VragError::DatabaseError(format!("Failed to list collections: {e}")))?;

        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn collection_vector_size(&self, collection: &str) -> Result<Option<u64>> {
        let info = self.client.collection_info(collection).await.map_err(|e| {
            VragError::DatabaseError(format!("Failed to get collection info: {e}"))
        })?;

        let config = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        // Named vectors are not used by this schema; report the size only when
        // the map holds a single entry.
        let size = match config {
            Some(vectors_config::Config::Params(params)) => Some(params.size),
            Some(vectors_config::Config::ParamsMap(map)) if map.map.len() == 1 => {
                map.map.values().next().map(|p| p.size)
            }
            _ => None,
        };

        Ok(size)
    }

    async fn create_collection(&self, collection: &str, vector_size: u64) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine))
                    .on_disk_payload(self.on_disk_payload),
            )
            .await
            .map_err(|e| VragError::DatabaseError(format!("Failed to create collection: {e}")))?;

        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.client
            .delete_collection(DeleteCollectionBuilder::new(collection))
            .await
            .map_err(|e| VragError::DatabaseError(format!("Failed to delete collection: {e}")))?;

        Ok(())
    }

    async fn create_payload_index(
        &self,
        collection: &str,
        field: &str,
        kind: PayloadFieldKind,
    ) -> Result<()> {
        let field_type = match kind {
            PayloadFieldKind::Integer => FieldType::Integer,
            PayloadFieldKind::Keyword => FieldType::Keyword,
        };

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                collection, field, field_type,
            ))
            .await
            .map_err(|e| {
                VragError::DatabaseError(format!("Failed to create payload index {field}: {e}"))
            })?;

        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<DocumentPoint>) -> Result<()> {
        let points = points
            .into_iter()
            .map(to_point_struct)
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| VragError::DatabaseError(format!("Failed to upsert vectors: {e}")))?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        user: &UserContext,
        limit: usize,
    ) -> Result<Vec<StoreHit>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, query_vector.to_vec(), limit as u64)
                    .filter(access_filter(user))
                    .with_payload(true),
            )
            .await
            .map_err(|e| VragError::SearchError(format!("Vector search failed: {e}")))?;

        let hits = results.result.into_iter().map(hit_from_point).collect();

        Ok(hits)
    }
}

/// Conjunctive filter: level at or below the user's, same dept and project,
/// and the user's role among the allowed roles.
fn access_filter(user: &UserContext) -> Filter {
    Filter::must([
        Condition::range(
            UPLOADER_LEVEL_KEY,
            Range {
                lte: Some(user.level as f64),
                ..Default::default()
            },
        ),
        Condition::matches(DEPT_KEY, user.dept.clone()),
        Condition::matches(PROJECT_KEY, user.project.clone()),
        Condition::matches(ALLOW_ROLES_KEY, user.role.clone()),
    ])
}

fn to_point_struct(point: DocumentPoint) -> Result<PointStruct> {
    let payload: HashMap<String, Value> = point
        .payload
        .to_json_map()?
        .into_iter()
        .map(|(k, v)| (k, v.into()))
        .collect();

    Ok(PointStruct::new(point.id.to_string(), point.vector, payload))
}

fn hit_from_point(point: ScoredPoint) -> StoreHit {
    let id = point.id.map(point_id_to_string).unwrap_or_default();
    let map = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| value_to_json(v).map(|json| (k, json)))
        .collect();

    StoreHit {
        id,
        score: point.score,
        payload: ChunkPayload::from_stored_map(map),
    }
}

fn point_id_to_string(id: PointId) -> String {
    match id.point_id_options {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(s)) => s,
        None => String::new(),
    }
}

fn value_to_json(value: Value) -> Option<serde_json::Value> {
    use serde_json::Value as Json;

    match value.kind? {
        Kind::NullValue(_) => Some(Json::Null),
        Kind::BoolValue(b) => Some(Json::Bool(b)),
        Kind::IntegerValue(i) => Some(Json::from(i)),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(f).map(Json::Number),
        Kind::StringValue(s) => Some(Json::String(s)),
        Kind::ListValue(list) => Some(Json::Array(
            list.values.into_iter().filter_map(value_to_json).collect(),
        )),
        Kind::StructValue(st) => Some(Json::Object(
            st.fields
                .into_iter()
                .filter_map(|(k, v)| value_to_json(v).map(|json| (k, json)))
                .collect(),
        )),
    }
}
