//! Port for fetching source documents.

use async_trait::async_trait;

use crate::domain::errors::SibylResult;

/// A fetched document payload plus the content type reported by the source.
///
/// The payload is kept as raw bytes so the ingestor can extract text from
/// binary formats such as PDF instead of assuming UTF-8.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedDocument {
    /// Whether the payload looks like a PDF, by declared content type or by
    /// the `%PDF-` magic prefix.
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"))
            || self.bytes.starts_with(b"%PDF-")
    }
}

/// Retrieves raw document content from a source location.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the document at `url`.
    ///
    /// # Errors
    /// Returns `SibylError::Ingestion` with the `fetched` stage on network
    /// failure, non-success status, or an unreadable body.
    async fn fetch(&self, url: &str) -> SibylResult<FetchedDocument>;
}
