//! Document ingestion pipeline.
//!
//! Runs fetch, extract, split, embed, store as a strict stage sequence.
//! All stages before `stored` work on in-memory state only; the store
//! commit replaces the document's previous chunk set in one transaction,
//! so a failure at any stage leaves the previous version fully intact.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::{Document, IndexedRecord, IngestReport, IngestStage};
use crate::domain::ports::{DocumentFetcher, Embedder, FetchedDocument, VectorStore};
use crate::services::splitter::Splitter;

/// Source label recorded for text supplied directly instead of fetched.
pub const DIRECT_INPUT: &str = "direct_input";

/// Orchestrates the ingestion stages for one document at a time.
pub struct Ingestor {
    fetcher: Arc<dyn DocumentFetcher>,
    splitter: Splitter,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Ingestor {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        splitter: Splitter,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            fetcher,
            splitter,
            embedder,
            store,
        }
    }

    /// Fetch the document at `url` and ingest it under `document_id`.
    ///
    /// Re-ingesting an existing id replaces its chunk set atomically and
    /// bumps the document version.
    pub async fn ingest(&self, document_id: &str, url: &str) -> SibylResult<IngestReport> {
        let fetched = self.fetcher.fetch(url).await?;
        let text = Self::extract(document_id, &fetched)?;
        self.index(document_id, url, &text).await
    }

    /// Ingest text supplied directly, bypassing the fetch stage.
    pub async fn ingest_text(&self, document_id: &str, text: &str) -> SibylResult<IngestReport> {
        let text = Self::normalize(document_id, text)?;
        self.index(document_id, DIRECT_INPUT, &text).await
    }

    /// Remove a document and its chunks.
    ///
    /// # Returns
    /// Number of chunks removed.
    pub async fn delete_document(&self, document_id: &str) -> SibylResult<u64> {
        let removed = self.store.delete_by_document(document_id).await?;
        info!(document_id, removed, "document deleted");
        Ok(removed)
    }

    /// Extract stage: decode the fetched payload into plain text.
    ///
    /// PDF payloads get their text extracted; anything else must be valid
    /// UTF-8. Undecodable payloads fail here rather than being indexed as
    /// noise.
    fn extract(document_id: &str, fetched: &FetchedDocument) -> SibylResult<String> {
        let raw = if fetched.is_pdf() {
            pdf_extract::extract_text_from_mem(&fetched.bytes).map_err(|e| {
                SibylError::ingestion(
                    document_id,
                    IngestStage::Extracted,
                    format!("PDF text extraction failed: {e}"),
                )
            })?
        } else {
            std::str::from_utf8(&fetched.bytes)
                .map_err(|_| {
                    SibylError::ingestion(
                        document_id,
                        IngestStage::Extracted,
                        "payload is neither PDF nor UTF-8 text",
                    )
                })?
                .to_string()
        };
        Self::normalize(document_id, &raw)
    }

    /// Normalize line endings and reject empty payloads.
    fn normalize(document_id: &str, raw: &str) -> SibylResult<String> {
        let text = raw.replace("\r\n", "\n");
        if text.trim().is_empty() {
            return Err(SibylError::ingestion(
                document_id,
                IngestStage::Extracted,
                "document contains no text",
            ));
        }
        Ok(text)
    }

    /// Split, embed, and atomically store extracted text.
    async fn index(
        &self,
        document_id: &str,
        source_url: &str,
        text: &str,
    ) -> SibylResult<IngestReport> {
        let chunks = self.splitter.split(document_id, text)?;
        if chunks.is_empty() {
            return Err(SibylError::ingestion(
                document_id,
                IngestStage::Split,
                "splitter produced no chunks",
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| SibylError::ingestion(document_id, IngestStage::Embedded, e))?;

        if embeddings.len() != chunks.len() {
            return Err(SibylError::ingestion(
                document_id,
                IngestStage::Embedded,
                format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            ));
        }

        // Version bumps on re-ingest; readers keep the old chunk set until
        // the replace transaction commits.
        let version = match self.store.find_document(document_id).await? {
            Some(existing) => existing.version + 1,
            None => 1,
        };

        let now = Utc::now();
        let document = Document {
            id: document_id.to_string(),
            source_url: source_url.to_string(),
            version,
            ingested_at: now,
        };

        let records: Vec<IndexedRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedRecord {
                chunk,
                embedding,
                model_id: self.embedder.model_id().to_string(),
                source_url: source_url.to_string(),
                ingested_at: now,
            })
            .collect();

        let chunk_count = records.len();
        let total_tokens: usize = records.iter().map(|r| r.chunk.token_count).sum();

        self.store
            .replace_document(&document, &records)
            .await
            .map_err(|e| match e {
                // Dimension/model mismatches are configuration defects, not
                // stage failures; let them keep their kind.
                SibylError::Configuration(_) => e,
                other => SibylError::ingestion(document_id, IngestStage::Stored, other),
            })?;

        info!(
            document_id,
            version, chunk_count, total_tokens, "document ingested"
        );

        Ok(IngestReport {
            document_id: document_id.to_string(),
            version,
            chunk_count,
            total_tokens,
        })
    }
}
