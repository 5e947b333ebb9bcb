//! Port for embedding text into fixed-dimension vectors.

use async_trait::async_trait;

use crate::domain::errors::SibylResult;

/// Service for converting text into dense vectors.
///
/// Implementations must be deterministic for identical inputs within a model
/// version, and must return vectors in the same order as the input batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts.
    ///
    /// # Arguments
    /// * `texts` - Texts to embed; order is preserved in the output
    ///
    /// # Returns
    /// One vector per input text, each of `dimension()` length.
    ///
    /// # Errors
    /// Returns `SibylError::Embedding` if any input is empty, exceeds the
    /// model's input limit, or the backing service fails.
    async fn embed_batch(&self, texts: &[String]) -> SibylResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> SibylResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| crate::domain::errors::SibylError::Embedding {
            reason: "embedder returned no vector for single input".to_string(),
            retryable: false,
        })
    }

    /// Dimensionality of produced vectors.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model, recorded with every stored vector.
    fn model_id(&self) -> &str;

    /// Maximum accepted input length in tokens.
    fn max_input_tokens(&self) -> usize;
}
