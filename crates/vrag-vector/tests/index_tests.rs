//! Document index integration tests
//!
//! Run against the in-process store; the Qdrant backend shares the same
//! trait and filter semantics.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use vrag_core::{AllowRoles, ChunkMetadata, UserContext};
use vrag_vector::{DocumentIndex, EnsureOutcome, InMemoryStore, VectorBackend};

const DIM: u64 = 8;

fn vector(seed: usize) -> Vec<f32> {
    let mut v = vec![0.1; DIM as usize];
    v[seed % DIM as usize] = 1.0;
    v
}

fn setup() -> (Arc<InMemoryStore>, DocumentIndex) {
    let store = Arc::new(InMemoryStore::new());
    let index = DocumentIndex::new(store.clone(), "documents", DIM);
    (store, index)
}

// =============================================================================
// Collection Provisioning
// =============================================================================

#[tokio::test]
async fn test_ensure_collection_is_idempotent() {
    let (store, index) = setup();

    assert_eq!(index.ensure_collection().await, EnsureOutcome::Created);

    index
        .upsert_text_chunks(
            &["kept".to_string()],
            &[vector(0)],
            &[ChunkMetadata::new(1, "eng", "x", "member")],
        )
        .await
        .unwrap();
    let indexes_before = store.indexes("documents").await;

    assert_eq!(index.ensure_collection().await, EnsureOutcome::AlreadyPresent);
    assert_eq!(index.ensure_collection().await, EnsureOutcome::AlreadyPresent);

    assert_eq!(store.point_count("documents").await, Some(1));
    assert_eq!(store.indexes("documents").await, indexes_before);
}

#[tokio::test]
async fn test_dimension_mismatch_recreates_collection() {
    let (store, index) = setup();

    // Collection left behind by an older 1536-dimension embedding model
    let old = DocumentIndex::new(store.clone(), "documents", 1536);
    assert_eq!(old.ensure_collection().await, EnsureOutcome::Created);
    old.upsert_text_chunks(
        &["stale".to_string()],
        &[vec![0.5; 1536]],
        &[ChunkMetadata::new(1, "eng", "x", "member")],
    )
    .await
    .unwrap();
    assert_eq!(store.point_count("documents").await, Some(1));

    let outcome = index.ensure_collection().await;
    assert_eq!(
        outcome,
        EnsureOutcome::Recreated {
            previous_size: 1536
        }
    );
    assert!(outcome.is_usable());

    assert_eq!(store.point_count("documents").await, Some(0));
    assert_eq!(
        store.collection_vector_size("documents").await.unwrap(),
        Some(DIM)
    );
    assert_eq!(store.indexes("documents").await.len(), 4);
}

#[tokio::test]
async fn test_other_collections_untouched() {
    let (store, index) = setup();
    store.create_collection("archive", 1536).await.unwrap();

    index.ensure_collection().await;

    let mut names = store.list_collections().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["archive".to_string(), "documents".to_string()]);
}

// =============================================================================
// Filtered Search
// =============================================================================

#[tokio::test]
async fn test_filter_correctness() {
    let (_store, index) = setup();
    index.ensure_collection().await;

    let cases = [
        ("visible-level-1", ChunkMetadata::new(1, "eng", "x", "member")),
        ("visible-level-2", ChunkMetadata::new(2, "eng", "x", "member")),
        (
            "visible-role-list",
            ChunkMetadata::new(
                0,
                "eng",
                "x",
                AllowRoles::Many(vec!["admin".to_string(), "member".to_string()]),
            ),
        ),
        ("hidden-level", ChunkMetadata::new(3, "eng", "x", "member")),
        ("hidden-dept", ChunkMetadata::new(1, "ops", "x", "member")),
        ("hidden-project", ChunkMetadata::new(1, "eng", "y", "member")),
        ("hidden-role", ChunkMetadata::new(1, "eng", "x", "admin")),
    ];

    let texts: Vec<String> = cases.iter().map(|(t, _)| t.to_string()).collect();
    let vectors: Vec<Vec<f32>> = (0..cases.len()).map(vector).collect();
    let metadata: Vec<ChunkMetadata> = cases.iter().map(|(_, m)| m.clone()).collect();
    index
        .upsert_text_chunks(&texts, &vectors, &metadata)
        .await
        .unwrap();

    let user = UserContext::new(2, "member", "eng", "x");
    let passages = index.filtered_search(&vector(0), &user, 20).await.unwrap();

    let mut found: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
    found.sort_unstable();
    assert_eq!(
        found,
        vec!["visible-level-1", "visible-level-2", "visible-role-list"]
    );

    for passage in &passages {
        assert!(user.permits(&passage.payload.metadata));
    }
}

#[tokio::test]
async fn test_round_trip_ingest_and_search() {
    let (_store, index) = setup();
    index.ensure_collection().await;

    let text = "Annual leave requests go through the team lead.".to_string();
    let metadata = ChunkMetadata::new(2, "eng", "x", "member").with_extra("source", "handbook.md");
    let ids = index
        .upsert_text_chunks(&[text.clone()], &[vector(3)], &[metadata])
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);

    let user = UserContext::new(2, "member", "eng", "x");
    let passages = index.filtered_search(&vector(3), &user, 20).await.unwrap();

    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].text, text);
    assert_eq!(passages[0].payload.text, text);
    assert_eq!(passages[0].payload.metadata.dept, "eng");
    assert_eq!(passages[0].payload.metadata.project, "x");
    assert_eq!(passages[0].payload.metadata.uploader_level, 2);
    assert_eq!(
        passages[0].payload.metadata.allow_roles,
        AllowRoles::One("member".to_string())
    );
    assert_eq!(
        passages[0].payload.metadata.extra["source"],
        serde_json::json!("handbook.md")
    );
}

#[tokio::test]
async fn test_search_without_collection_errors() {
    let (_store, index) = setup();
    let user = UserContext::new(2, "member", "eng", "x");
    assert!(index.filtered_search(&vector(0), &user, 5).await.is_err());
}
