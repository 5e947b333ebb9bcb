//! Port for the answer-generation backend.

use async_trait::async_trait;

use crate::domain::errors::SibylResult;
use crate::domain::models::{GenerationOutput, GenerationRequest};

/// Service that turns a grounded prompt into a structured answer.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer for the given request.
    ///
    /// Implementations handle their own transient-failure retries; the
    /// overall query deadline is enforced by the caller.
    ///
    /// # Errors
    /// Returns `SibylError::GenerationFailed` for unrecoverable backend
    /// failures or unparseable responses.
    async fn generate(&self, request: &GenerationRequest) -> SibylResult<GenerationOutput>;
}
