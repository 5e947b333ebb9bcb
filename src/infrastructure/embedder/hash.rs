//! Deterministic local embedder based on signed feature hashing.
//!
//! Each lowercase alphanumeric token is hashed into one of `dimension`
//! buckets with an FNV-1a hash; a second bit of the hash decides the sign.
//! The result is L2-normalized, so texts that share vocabulary have high
//! cosine similarity. Same text and model version always produce the same
//! vector, which keeps the index reproducible and the pipeline testable
//! without a model server.

use async_trait::async_trait;

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::EmbeddingConfig;
use crate::domain::ports::Embedder;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Local feature-hashing embedder.
pub struct HashEmbedder {
    model_id: String,
    dimension: usize,
    max_input_tokens: usize,
}

impl HashEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            dimension: config.dimension,
            max_input_tokens: config.max_input_tokens,
        }
    }

    fn fnv1a(token: &str) -> u64 {
        let mut hash = FNV_OFFSET;
        for byte in token.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    /// Embed one text. Exposed for direct use in tests.
    pub fn embed_text(&self, text: &str) -> SibylResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SibylError::Embedding {
                reason: "cannot embed empty text".to_string(),
                retryable: false,
            });
        }

        let mut vector = vec![0.0f32; self.dimension];
        let mut token_count = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            token_count += 1;
            if token_count > self.max_input_tokens {
                return Err(SibylError::Embedding {
                    reason: format!(
                        "input exceeds max_input_tokens ({})",
                        self.max_input_tokens
                    ),
                    retryable: false,
                });
            }

            let lowered = token.to_lowercase();
            let hash = Self::fnv1a(&lowered);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        if token_count == 0 {
            return Err(SibylError::Embedding {
                reason: "text contains no embeddable tokens".to_string(),
                retryable: false,
            });
        }

        // f64 accumulation avoids error build-up across many dimensions
        let magnitude_f64: f64 = vector
            .iter()
            .map(|x| f64::from(*x) * f64::from(*x))
            .sum::<f64>()
            .sqrt();
        let magnitude = magnitude_f64 as f32;

        if magnitude > 1e-10 {
            for val in &mut vector {
                *val /= magnitude;
            }
        }

        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> SibylResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(SibylError::Embedding {
                reason: "cannot embed an empty batch".to_string(),
                retryable: false,
            });
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_text(text)?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn text_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9][a-zA-Z0-9 .,!?;:'-]{0,500}").expect("Valid regex")
    }

    proptest! {
        #[test]
        fn proptest_embedding_determinism(text in text_strategy()) {
            let service = HashEmbedder::new(&EmbeddingConfig::default());
            if let (Ok(emb1), Ok(emb2)) = (service.embed_text(&text), service.embed_text(&text)) {
                prop_assert_eq!(emb1, emb2);
            }
        }

        #[test]
        fn proptest_l2_normalization(text in text_strategy()) {
            let service = HashEmbedder::new(&EmbeddingConfig::default());
            if let Ok(embedding) = service.embed_text(&text) {
                let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
                prop_assert!((magnitude - 1.0).abs() < 1e-4, "L2 norm was {}", magnitude);
                for val in &embedding {
                    prop_assert!(val.is_finite());
                }
            }
        }

        #[test]
        fn proptest_embedding_dimensions(text in text_strategy()) {
            let service = HashEmbedder::new(&EmbeddingConfig::default());
            if let Ok(embedding) = service.embed_text(&text) {
                prop_assert_eq!(embedding.len(), 384);
            }
        }
    }
}
