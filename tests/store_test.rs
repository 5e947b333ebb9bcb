//! Integration tests for the SQLite vector store.

mod common;

use chrono::Utc;

use sibyl::domain::errors::SibylError;
use sibyl::domain::models::{Chunk, Document, IndexedRecord};
use sibyl::domain::ports::VectorStore;
use sibyl::infrastructure::embedder::HashEmbedder;

use common::{test_embedder, test_store, TEST_DIMENSION};

fn record(embedder: &HashEmbedder, doc: &str, index: usize, text: &str) -> IndexedRecord {
    IndexedRecord {
        chunk: Chunk {
            document_id: doc.to_string(),
            index,
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            start_token: index * 10,
            end_token: index * 10 + 10,
            overlaps_previous: index > 0,
        },
        embedding: embedder.embed_text(text).expect("embeddable text"),
        model_id: "feature-hash-v1".to_string(),
        source_url: "direct_input".to_string(),
        ingested_at: Utc::now(),
    }
}

#[tokio::test]
async fn upsert_is_idempotent_by_key() {
    let (store, _dir) = test_store().await;
    let embedder = test_embedder();

    let records = vec![
        record(&embedder, "doc-a", 0, "the blackout window opens at midnight"),
        record(&embedder, "doc-a", 1, "change freezes apply during the window"),
    ];

    store.upsert(&records).await.unwrap();
    store.upsert(&records).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunk_count, 2);
    assert_eq!(stats.document_count, 1);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected_and_store_unchanged() {
    let (store, _dir) = test_store().await;
    let embedder = test_embedder();

    let mut bad = record(&embedder, "doc-a", 0, "some text");
    bad.embedding = vec![0.5; TEST_DIMENSION + 1];

    let result = store.upsert(&[bad]).await;
    assert!(matches!(result, Err(SibylError::Configuration(_))));

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunk_count, 0);
    assert_eq!(stats.document_count, 0);
}

#[tokio::test]
async fn replace_document_swaps_chunk_set() {
    let (store, _dir) = test_store().await;
    let embedder = test_embedder();

    let first = vec![
        record(&embedder, "doc-a", 0, "old chunk zero"),
        record(&embedder, "doc-a", 1, "old chunk one"),
        record(&embedder, "doc-a", 2, "old chunk two"),
    ];
    store
        .replace_document(&Document::new("doc-a", "direct_input"), &first)
        .await
        .unwrap();

    let mut replacement_doc = Document::new("doc-a", "direct_input");
    replacement_doc.version = 2;
    let second = vec![record(&embedder, "doc-a", 0, "new chunk zero")];
    store.replace_document(&replacement_doc, &second).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunk_count, 1);

    let stored = store.find_document("doc-a").await.unwrap().unwrap();
    assert_eq!(stored.version, 2);

    // Old chunks must not be findable by keyword
    let hits = store.search_by_keyword("old", 10).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn delete_by_document_reports_removed_count() {
    let (store, _dir) = test_store().await;
    let embedder = test_embedder();

    let records = vec![
        record(&embedder, "doc-a", 0, "alpha"),
        record(&embedder, "doc-a", 1, "beta"),
        record(&embedder, "doc-b", 0, "gamma"),
    ];
    store.upsert(&records).await.unwrap();

    let removed = store.delete_by_document("doc-a").await.unwrap();
    assert_eq!(removed, 2);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunk_count, 1);
    assert_eq!(stats.document_count, 1);

    assert_eq!(store.delete_by_document("doc-a").await.unwrap(), 0);
    assert!(store.find_document("doc-a").await.unwrap().is_none());
}

#[tokio::test]
async fn nearest_by_vector_ranks_similar_text_first() {
    let (store, _dir) = test_store().await;
    let embedder = test_embedder();

    let records = vec![
        record(&embedder, "doc-a", 0, "blackout maintenance window every sunday"),
        record(&embedder, "doc-b", 0, "quarterly revenue figures improved sharply"),
        record(&embedder, "doc-c", 0, "team lunch menu for next week"),
    ];
    store.upsert(&records).await.unwrap();

    let query = embedder.embed_text("when is the blackout window").unwrap();
    let hits = store.nearest_by_vector(&query, 3).await.unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].record.chunk.document_id, "doc-a");
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn nearest_by_vector_rejects_wrong_dimension_query() {
    let (store, _dir) = test_store().await;
    let query = vec![0.1f32; TEST_DIMENSION * 2];
    let result = store.nearest_by_vector(&query, 5).await;
    assert!(matches!(result, Err(SibylError::Configuration(_))));
}

#[tokio::test]
async fn keyword_search_finds_matching_terms() {
    let (store, _dir) = test_store().await;
    let embedder = test_embedder();

    let records = vec![
        record(&embedder, "doc-a", 0, "blackout windows are scheduled on Sundays"),
        record(&embedder, "doc-b", 0, "the cafeteria serves pasta on Mondays"),
    ];
    store.upsert(&records).await.unwrap();

    let hits = store.search_by_keyword("blackout schedule", 5).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].record.chunk.document_id, "doc-a");
}

#[tokio::test]
async fn keyword_search_with_punctuation_only_query_is_empty() {
    let (store, _dir) = test_store().await;
    let hits = store.search_by_keyword("?!...", 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn recorded_model_id_reflects_stored_records() {
    let (store, _dir) = test_store().await;
    let embedder = test_embedder();

    assert!(store.recorded_model_id().await.unwrap().is_none());

    store
        .upsert(&[record(&embedder, "doc-a", 0, "some text")])
        .await
        .unwrap();

    assert_eq!(
        store.recorded_model_id().await.unwrap().as_deref(),
        Some("feature-hash-v1")
    );
}
