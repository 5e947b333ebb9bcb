//! Token-window document splitter.
//!
//! Splits a document's token stream into fixed-size windows that advance by
//! `chunk_size - chunk_overlap` tokens, so every chunk after the first
//! repeats the previous chunk's tail. Chunk text is the exact BPE decode of
//! its token span: concatenating chunks minus their overlaps reconstructs
//! the original text.

use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::{Chunk, ChunkingConfig};

/// Token-window splitter using the cl100k_base tokenizer.
pub struct Splitter {
    bpe: CoreBPE,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Splitter {
    /// Create a splitter for the given window configuration.
    ///
    /// # Errors
    /// Returns `SibylError::Configuration` if the overlap is not strictly
    /// smaller than the chunk size (the window would never advance) or the
    /// tokenizer fails to load.
    pub fn new(config: &ChunkingConfig) -> SibylResult<Self> {
        if config.chunk_size == 0 {
            return Err(SibylError::Configuration(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(SibylError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        let bpe = cl100k_base()
            .map_err(|e| SibylError::Configuration(format!("tokenizer load failed: {e}")))?;

        Ok(Self {
            bpe,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        })
    }

    /// Number of tokens in `text`.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split `text` into overlapping chunks for `document_id`.
    ///
    /// Whitespace-only input yields no chunks. Input at most `chunk_size`
    /// tokens long yields exactly one chunk with no overlap.
    pub fn split(&self, document_id: &str, text: &str) -> SibylResult<Vec<Chunk>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let tokens = self.bpe.encode_ordinary(text);
        let total = tokens.len();
        let stride = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < total {
            let end = (start + self.chunk_size).min(total);
            let span = tokens[start..end].to_vec();
            let chunk_text = self.bpe.decode(span).map_err(|e| {
                SibylError::ingestion(
                    document_id,
                    crate::domain::models::IngestStage::Split,
                    format!("token span [{start}, {end}) did not decode: {e}"),
                )
            })?;

            chunks.push(Chunk {
                document_id: document_id.to_string(),
                index,
                text: chunk_text,
                token_count: end - start,
                start_token: start,
                end_token: end,
                overlaps_previous: index > 0,
            });

            if end == total {
                break;
            }
            start += stride;
            index += 1;
        }

        Ok(chunks)
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn text_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9 .,]{1,2000}").expect("Valid regex")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn proptest_split_is_deterministic(text in text_strategy()) {
            let splitter = Splitter::new(&ChunkingConfig {
                chunk_size: 32,
                chunk_overlap: 8,
            }).unwrap();

            let a = splitter.split("doc", &text).unwrap();
            let b = splitter.split("doc", &text).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn proptest_windows_respect_bounds(text in text_strategy()) {
            let splitter = Splitter::new(&ChunkingConfig {
                chunk_size: 32,
                chunk_overlap: 8,
            }).unwrap();

            let chunks = splitter.split("doc", &text).unwrap();
            let total = splitter.count_tokens(&text);

            for chunk in &chunks {
                prop_assert!(chunk.token_count <= 32);
                prop_assert_eq!(chunk.token_count, chunk.end_token - chunk.start_token);
                prop_assert!(chunk.end_token <= total);
            }
            if let Some(last) = chunks.last() {
                prop_assert_eq!(last.end_token, total);
            }
            for window in chunks.windows(2) {
                prop_assert_eq!(window[1].start_token, window[0].start_token + 24);
            }
        }
    }
}
