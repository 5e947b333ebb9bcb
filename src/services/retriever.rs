//! Hybrid retrieval with reciprocal rank fusion.
//!
//! Runs the dense-vector and keyword channels for each query, then fuses
//! their rankings with `score = sum over channels of 1 / (rank + k)`. When
//! the keyword channel is disabled or fails, retrieval degrades to pure
//! vector order and the result is flagged, never padded with fabricated
//! lexical scores.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::{Channel, RankedHit, RetrievalConfig, RetrievalResult};
use crate::domain::ports::{Embedder, ScoredRecord, VectorStore};

/// Hybrid retriever over one embedder and one store.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Retrieve the fused top-K chunks for `query`.
    ///
    /// # Errors
    /// Returns `SibylError::Configuration` when the store holds vectors from
    /// a different embedder model than the active one, and propagates
    /// embedding and vector-channel failures. A keyword-channel failure is
    /// not fatal: the result degrades to vector-only and says so.
    pub async fn retrieve(&self, query: &str) -> SibylResult<RetrievalResult> {
        if let Some(recorded) = self.store.recorded_model_id().await? {
            if recorded != self.embedder.model_id() {
                return Err(SibylError::Configuration(format!(
                    "store holds vectors from model '{recorded}' but active embedder is '{}'; \
                     re-ingest before querying",
                    self.embedder.model_id()
                )));
            }
        }

        let query_vector = self.embedder.embed(query).await?;
        let candidates = self.config.top_k * self.config.candidate_multiplier;
        let keyword_active = self.config.keyword_enabled && self.store.keyword_available();

        // Both channels run concurrently; the keyword channel is optional
        let (vector_result, keyword_result) = futures::future::join(
            self.store.nearest_by_vector(&query_vector, candidates),
            async {
                if keyword_active {
                    Some(self.store.search_by_keyword(query, candidates).await)
                } else {
                    None
                }
            },
        )
        .await;

        let vector_hits = vector_result?;
        let (keyword_hits, degraded) = match keyword_result {
            Some(Ok(hits)) => (hits, false),
            Some(Err(e)) => {
                warn!(error = %e, "keyword channel failed, degrading to vector-only");
                (Vec::new(), true)
            }
            None => {
                debug!("keyword channel disabled or unavailable, retrieval is vector-only");
                (Vec::new(), true)
            }
        };

        let mut hits = reciprocal_rank_fusion(&vector_hits, &keyword_hits, self.config.rrf_k);
        hits.truncate(self.config.top_k);

        debug!(
            query_len = query.len(),
            vector_candidates = vector_hits.len(),
            keyword_candidates = keyword_hits.len(),
            fused = hits.len(),
            degraded,
            "retrieval complete"
        );

        let Some(top) = hits.first() else {
            return Ok(RetrievalResult::empty(degraded));
        };
        debug!(score = top.score, preview = %top.record.chunk.preview(), "top fused hit");

        Ok(RetrievalResult { hits, degraded })
    }
}

/// Fuse two channel rankings into one list, best first.
///
/// Each record scores `1 / (rank + k)` per channel it appears in, with
/// 1-based ranks. Ties are broken by vector-channel rank (keyword-only
/// hits sort after vector hits of equal score), then document id, then
/// chunk index, so equal inputs always fuse identically.
pub fn reciprocal_rank_fusion(
    vector: &[ScoredRecord],
    keyword: &[ScoredRecord],
    k: usize,
) -> Vec<RankedHit> {
    struct Fused {
        hit: ScoredRecord,
        score: f64,
        channels: Vec<Channel>,
        vector_rank: usize,
    }

    let mut fused: HashMap<(String, usize), Fused> = HashMap::new();

    for (rank0, scored) in vector.iter().enumerate() {
        let rank = rank0 + 1;
        let key = (scored.record.chunk.document_id.clone(), scored.record.chunk.index);
        fused.insert(
            key,
            Fused {
                hit: scored.clone(),
                score: 1.0 / (rank + k) as f64,
                channels: vec![Channel::Vector],
                vector_rank: rank,
            },
        );
    }

    for (rank0, scored) in keyword.iter().enumerate() {
        let rank = rank0 + 1;
        let key = (scored.record.chunk.document_id.clone(), scored.record.chunk.index);
        let contribution = 1.0 / (rank + k) as f64;

        match fused.get_mut(&key) {
            Some(entry) => {
                entry.score += contribution;
                entry.channels.push(Channel::Keyword);
            }
            None => {
                fused.insert(
                    key,
                    Fused {
                        hit: scored.clone(),
                        score: contribution,
                        channels: vec![Channel::Keyword],
                        vector_rank: usize::MAX,
                    },
                );
            }
        }
    }

    let mut entries: Vec<Fused> = fused.into_values().collect();
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.vector_rank.cmp(&b.vector_rank))
            .then_with(|| a.hit.record.chunk.document_id.cmp(&b.hit.record.chunk.document_id))
            .then_with(|| a.hit.record.chunk.index.cmp(&b.hit.record.chunk.index))
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(rank, entry)| RankedHit {
            record: entry.hit.record,
            score: entry.score,
            rank,
            channels: entry.channels,
        })
        .collect()
}



#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::domain::models::{Chunk, IndexedRecord};
    use chrono::Utc;
    use proptest::prelude::*;

    fn record(doc_index: usize, chunk_index: usize) -> ScoredRecord {
        ScoredRecord {
            record: IndexedRecord {
                chunk: Chunk {
                    document_id: format!("doc-{doc_index}"),
                    index: chunk_index,
                    text: String::from("text"),
                    token_count: 1,
                    start_token: 0,
                    end_token: 1,
                    overlaps_previous: false,
                },
                embedding: vec![0.0; 4],
                model_id: "test".to_string(),
                source_url: "direct_input".to_string(),
                ingested_at: Utc::now(),
            },
            score: 0.0,
        }
    }

    fn channel_strategy() -> impl Strategy<Value = Vec<ScoredRecord>> {
        prop::collection::vec((0usize..5, 0usize..5), 0..12).prop_map(|keys| {
            let mut seen = std::collections::HashSet::new();
            keys.into_iter()
                .filter(|key| seen.insert(*key))
                .map(|(d, c)| record(d, c))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn proptest_fused_scores_are_monotone(
            vector in channel_strategy(),
            keyword in channel_strategy(),
        ) {
            let fused = reciprocal_rank_fusion(&vector, &keyword, 60);
            for window in fused.windows(2) {
                prop_assert!(window[0].score >= window[1].score);
            }
            for (rank, hit) in fused.iter().enumerate() {
                prop_assert_eq!(hit.rank, rank);
            }
        }

        #[test]
        fn proptest_fusion_output_has_no_duplicate_keys(
            vector in channel_strategy(),
            keyword in channel_strategy(),
        ) {
            let fused = reciprocal_rank_fusion(&vector, &keyword, 60);
            let mut seen = std::collections::HashSet::new();
            for hit in &fused {
                let key = (hit.record.chunk.document_id.clone(), hit.record.chunk.index);
                prop_assert!(seen.insert(key), "duplicate record in fused output");
            }
        }
    }
}
