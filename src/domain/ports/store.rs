//! Port for persisting and searching indexed chunk records.

use async_trait::async_trait;

use crate::domain::errors::SibylResult;
use crate::domain::models::{Document, IndexedRecord};

/// A scored record returned by one search channel, before fusion.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: IndexedRecord,
    pub score: f64,
}

/// Summary counts for the `status` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub document_count: u64,
    pub chunk_count: u64,
}

/// Persistent store of embedded chunks, searchable by vector similarity and
/// by keyword.
///
/// Writes keyed by `(document_id, chunk_index)` are idempotent. A full
/// document replacement is atomic: concurrent readers see either the old
/// version or the new, never a mix.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite a batch of records.
    ///
    /// # Errors
    /// Returns `SibylError::Configuration` if any embedding's dimension does
    /// not match the store's configured dimension; the store is unchanged.
    async fn upsert(&self, records: &[IndexedRecord]) -> SibylResult<()>;

    /// Atomically replace all chunks of a document with a new set.
    ///
    /// The document row is written with `version` and the old chunks removed
    /// in the same transaction that inserts the new ones.
    async fn replace_document(
        &self,
        document: &Document,
        records: &[IndexedRecord],
    ) -> SibylResult<()>;

    /// Remove a document and all its chunks.
    ///
    /// # Returns
    /// Number of chunks removed. Zero for an unknown document.
    async fn delete_by_document(&self, document_id: &str) -> SibylResult<u64>;

    /// The `limit` records nearest to `query` by cosine similarity,
    /// descending. Ties broken by recency, then document id, then chunk
    /// index.
    async fn nearest_by_vector(
        &self,
        query: &[f32],
        limit: usize,
    ) -> SibylResult<Vec<ScoredRecord>>;

    /// The `limit` records best matching the query terms lexically,
    /// best first.
    async fn search_by_keyword(
        &self,
        query: &str,
        limit: usize,
    ) -> SibylResult<Vec<ScoredRecord>>;

    /// Whether this store can serve the keyword channel at all.
    ///
    /// A store with no keyword index of any kind returns `false`, and
    /// retrieval over it degrades to vector-only.
    fn keyword_available(&self) -> bool;

    /// Look up a document row by id.
    async fn find_document(&self, document_id: &str) -> SibylResult<Option<Document>>;

    /// Model id recorded with stored vectors, if any records exist.
    async fn recorded_model_id(&self) -> SibylResult<Option<String>>;

    /// Document and chunk counts.
    async fn stats(&self) -> SibylResult<StoreStats>;
}
