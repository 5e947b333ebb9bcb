//! Document domain models
//!
//! A document is the unit of ingestion: fetched once, split into chunks,
//! embedded, and committed to the store atomically. Re-ingestion creates a
//! new version rather than mutating records in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source document tracked by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier chosen by the caller (e.g., "insider-trading-policy").
    pub id: String,

    /// Where the raw text came from (URL or "direct_input").
    pub source_url: String,

    /// Monotonically increasing version, bumped on every re-ingest.
    pub version: i64,

    /// When this version was committed.
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Create a first-version document stamped now.
    pub fn new(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            version: 1,
            ingested_at: Utc::now(),
        }
    }
}

/// Ingestion pipeline stages, in strict order.
///
/// A failure at any stage aborts the whole document: no partial chunk set is
/// ever committed for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    /// Raw bytes downloaded from the source.
    Fetched,
    /// Plain text extracted from the raw payload.
    Extracted,
    /// Text split into overlapping token chunks.
    Split,
    /// Every chunk embedded.
    Embedded,
    /// All records committed to the vector store.
    Stored,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fetched => "fetched",
            Self::Extracted => "extracted",
            Self::Split => "split",
            Self::Embedded => "embedded",
            Self::Stored => "stored",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a successful ingestion, returned to administrative callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Document that was (re-)indexed.
    pub document_id: String,

    /// Version now live in the store.
    pub version: i64,

    /// Number of chunks committed.
    pub chunk_count: usize,

    /// Total tokens across all chunks (overlap counted once per chunk).
    pub total_tokens: usize,
}
