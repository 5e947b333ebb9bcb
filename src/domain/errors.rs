//! Domain errors for the Sibyl retrieval pipeline.

use thiserror::Error;

use crate::domain::models::IngestStage;

/// Errors surfaced across the Sibyl service boundary.
///
/// Every failure a caller can observe maps to one of these kinds so the
/// frontend collaborator can present a clear, non-fabricated failure message
/// instead of an opaque exception.
#[derive(Debug, Error)]
pub enum SibylError {
    /// Invalid configuration detected at startup or before a write.
    /// Fatal: the pipeline refuses to serve traffic with a bad config.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Embedding model invocation failed or returned the wrong shape.
    #[error("embedding failed: {reason}")]
    Embedding {
        reason: String,
        /// Whether the caller may retry (network blips yes, bad input no).
        retryable: bool,
    },

    /// The vector store is unreachable or rejected an operation.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// The answer-generation step did not return within its deadline.
    #[error("generation timed out after {waited_ms} ms")]
    GenerationTimeout { waited_ms: u64 },

    /// The answer-generation step returned an error.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// An ingestion stage failed; the whole document is rolled back.
    #[error("ingestion failed at {stage} stage for '{document_id}': {reason}")]
    Ingestion {
        document_id: String,
        stage: IngestStage,
        reason: String,
    },
}

impl SibylError {
    /// Stable machine-readable kind string exposed to collaborators.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Embedding { .. } => "embedding_failure",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::GenerationTimeout { .. } => "generation_timeout",
            Self::GenerationFailed(_) => "generation_failure",
            Self::Ingestion { .. } => "ingestion_stage_failure",
        }
    }

    /// True if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding { retryable, .. } => *retryable,
            Self::StoreUnavailable(_) | Self::GenerationTimeout { .. } => true,
            _ => false,
        }
    }

    /// Convenience constructor for ingestion stage failures.
    pub fn ingestion(
        document_id: impl Into<String>,
        stage: IngestStage,
        source: impl std::fmt::Display,
    ) -> Self {
        Self::Ingestion {
            document_id: document_id.into(),
            stage,
            reason: source.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type SibylResult<T> = Result<T, SibylError>;

impl From<sqlx::Error> for SibylError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SibylError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::StoreUnavailable(format!("migration failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(
            SibylError::Configuration("x".into()).kind(),
            "configuration_error"
        );
        assert_eq!(
            SibylError::GenerationTimeout { waited_ms: 28_000 }.kind(),
            "generation_timeout"
        );
        assert_eq!(
            SibylError::ingestion("doc", IngestStage::Embedded, "boom").kind(),
            "ingestion_stage_failure"
        );
    }

    #[test]
    fn test_retryability() {
        assert!(SibylError::StoreUnavailable("down".into()).is_retryable());
        assert!(SibylError::Embedding {
            reason: "503".into(),
            retryable: true
        }
        .is_retryable());
        assert!(!SibylError::Embedding {
            reason: "empty input".into(),
            retryable: false
        }
        .is_retryable());
        assert!(!SibylError::Configuration("bad".into()).is_retryable());
    }
}
