//! Retrieval domain models
//!
//! Ephemeral, per-query structures: ranked hits from the hybrid search,
//! the fused result list, and the context handed to the generation step.

use serde::{Deserialize, Serialize};

use crate::domain::models::IndexedRecord;

/// Which retrieval channel produced (or contributed to) a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Dense-vector nearest-neighbor search.
    Vector,
    /// Lexical keyword search.
    Keyword,
}

/// One fused, ranked retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedHit {
    /// The stored record this hit refers to.
    pub record: IndexedRecord,

    /// Fused relevance score (reciprocal rank fusion), higher is better.
    pub score: f64,

    /// Zero-based final rank after fusion.
    pub rank: usize,

    /// Channels that contributed to the fused score. A hit found by only
    /// one channel carries exactly that channel.
    pub channels: Vec<Channel>,
}

impl RankedHit {
    /// True if both channels agreed this record is relevant.
    pub fn is_consensus(&self) -> bool {
        self.channels.contains(&Channel::Vector) && self.channels.contains(&Channel::Keyword)
    }
}

/// Result of one hybrid retrieval, produced per query and discarded after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Top-K fused hits, best first.
    pub hits: Vec<RankedHit>,

    /// True when the keyword channel was unavailable or disabled and the
    /// ranking is pure vector order. Explicit by design: a missing channel
    /// is flagged, never papered over with fabricated lexical scores.
    pub degraded: bool,
}

impl RetrievalResult {
    /// An empty result (nothing indexed, or nothing matched).
    pub fn empty(degraded: bool) -> Self {
        Self {
            hits: Vec::new(),
            degraded,
        }
    }
}

/// A citation from a generated answer back to the chunk that supported it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Source document identifier.
    pub document_id: String,

    /// Chunk index within the document.
    pub chunk_index: usize,

    /// Where the document came from.
    pub source_url: String,

    /// Fused relevance score of the cited chunk.
    pub relevance_score: f64,
}

impl Citation {
    /// Build a citation from a ranked hit.
    pub fn from_hit(hit: &RankedHit) -> Self {
        Self {
            document_id: hit.record.chunk.document_id.clone(),
            chunk_index: hit.record.chunk.index,
            source_url: hit.record.source_url.clone(),
            relevance_score: hit.score,
        }
    }
}

/// The assembled context passed to the generation capability.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Top-K fused hits, best first.
    pub hits: Vec<RankedHit>,

    /// Citations for each hit, same order.
    pub citations: Vec<Citation>,

    /// Carried through from the retrieval result.
    pub degraded: bool,
}

impl QueryContext {
    /// Assemble a context from a retrieval result.
    pub fn from_retrieval(result: RetrievalResult) -> Self {
        let citations = result.hits.iter().map(Citation::from_hit).collect();
        Self {
            hits: result.hits,
            citations,
            degraded: result.degraded,
        }
    }

    /// True when retrieval found nothing to ground the answer on.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Chunk;
    use chrono::Utc;

    fn hit(doc: &str, index: usize, score: f64, channels: Vec<Channel>) -> RankedHit {
        RankedHit {
            record: IndexedRecord {
                chunk: Chunk {
                    document_id: doc.to_string(),
                    index,
                    text: "text".to_string(),
                    token_count: 1,
                    start_token: 0,
                    end_token: 1,
                    overlaps_previous: false,
                },
                embedding: vec![0.0; 4],
                model_id: "m".to_string(),
                source_url: "https://example.com/doc".to_string(),
                ingested_at: Utc::now(),
            },
            score,
            rank: 0,
            channels,
        }
    }

    #[test]
    fn test_consensus_requires_both_channels() {
        assert!(hit("d", 0, 1.0, vec![Channel::Vector, Channel::Keyword]).is_consensus());
        assert!(!hit("d", 0, 1.0, vec![Channel::Vector]).is_consensus());
    }

    #[test]
    fn test_context_citations_follow_hits() {
        let result = RetrievalResult {
            hits: vec![hit("doc-a", 3, 0.5, vec![Channel::Vector])],
            degraded: true,
        };
        let ctx = QueryContext::from_retrieval(result);
        assert_eq!(ctx.citations.len(), 1);
        assert_eq!(ctx.citations[0].document_id, "doc-a");
        assert_eq!(ctx.citations[0].chunk_index, 3);
        assert!(ctx.degraded);
    }
}
