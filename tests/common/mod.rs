//! Shared helpers for integration tests.

use std::sync::Arc;

use tempfile::TempDir;

use sibyl::domain::models::{DatabaseConfig, EmbeddingConfig};
use sibyl::infrastructure::embedder::HashEmbedder;
use sibyl::infrastructure::store::SqliteVectorStore;

/// Small dimension keeps hash-embedder tests fast while preserving enough
/// buckets for distinct vocabularies.
pub const TEST_DIMENSION: usize = 64;

pub fn test_embedding_config() -> EmbeddingConfig {
    EmbeddingConfig {
        dimension: TEST_DIMENSION,
        ..EmbeddingConfig::default()
    }
}

pub fn test_embedder() -> Arc<HashEmbedder> {
    Arc::new(HashEmbedder::new(&test_embedding_config()))
}

/// A store over a fresh temp database. The TempDir must outlive the store.
pub async fn test_store() -> (SqliteVectorStore, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let config = DatabaseConfig {
        path: dir
            .path()
            .join("sibyl-test.db")
            .to_string_lossy()
            .into_owned(),
        max_connections: 5,
    };
    let store = SqliteVectorStore::connect(&config, TEST_DIMENSION)
        .await
        .expect("store should connect");
    (store, dir)
}
