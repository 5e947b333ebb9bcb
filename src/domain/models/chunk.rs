//! Chunk domain models
//!
//! Chunks are the unit of retrieval: bounded, overlapping slices of a
//! document's token stream. Every chunk after the first shares its leading
//! `overlap` tokens with the tail of its predecessor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk of text cut from a document by the splitter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Parent document identifier.
    pub document_id: String,

    /// Zero-based position within the parent document.
    pub index: usize,

    /// Decoded text of this chunk's token span.
    pub text: String,

    /// Number of tokens in this chunk. Never exceeds the configured
    /// chunk size.
    pub token_count: usize,

    /// Start offset (inclusive) of this chunk in the document's token stream.
    pub start_token: usize,

    /// End offset (exclusive) of this chunk in the document's token stream.
    pub end_token: usize,

    /// True when the chunk's leading tokens repeat the previous chunk's
    /// tail. False for the first chunk of every document.
    pub overlaps_previous: bool,
}

impl Chunk {
    /// Returns true if this is the first chunk of its document.
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Get a preview of the content (first 100 chars).
    pub fn preview(&self) -> String {
        let mut end = self.text.len().min(100);
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        if end == self.text.len() {
            self.text.clone()
        } else {
            format!("{}...", &self.text[..end])
        }
    }
}

/// The persisted tuple the store keeps per chunk: text, vector, and the
/// metadata needed for citations and idempotent re-ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    /// The chunk itself.
    pub chunk: Chunk,

    /// Fixed-dimension embedding produced by exactly one embedder model.
    pub embedding: Vec<f32>,

    /// Identifier of the embedder model that produced `embedding`.
    /// Distances between vectors from different models are meaningless,
    /// so readers compare this against the active model before use.
    pub model_id: String,

    /// Where the parent document was fetched from.
    pub source_url: String,

    /// When this record was committed.
    pub ingested_at: DateTime<Utc>,
}

impl IndexedRecord {
    /// Storage key: (document ID, chunk index). Upserts are idempotent by
    /// this key.
    pub fn key(&self) -> (&str, usize) {
        (&self.chunk.document_id, self.chunk.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            document_id: "doc".to_string(),
            index,
            text: text.to_string(),
            token_count: 4,
            start_token: 0,
            end_token: 4,
            overlaps_previous: index > 0,
        }
    }

    #[test]
    fn test_is_first() {
        assert!(chunk(0, "a").is_first());
        assert!(!chunk(3, "a").is_first());
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let short = chunk(0, "short");
        assert_eq!(short.preview(), "short");

        let long = chunk(0, &"a".repeat(200));
        assert_eq!(long.preview().len(), 103); // 100 chars + "..."
    }

    #[test]
    fn test_record_key() {
        let record = IndexedRecord {
            chunk: chunk(2, "text"),
            embedding: vec![0.0; 4],
            model_id: "m".to_string(),
            source_url: "s".to_string(),
            ingested_at: Utc::now(),
        };
        assert_eq!(record.key(), ("doc", 2));
    }
}
