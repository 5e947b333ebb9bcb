//! Answer domain models
//!
//! The structured result of the generation step, returned to the frontend
//! collaborator. A failed or timed-out generation is surfaced as an error,
//! never replaced with a placeholder answer.

use serde::{Deserialize, Serialize};

use crate::domain::models::Citation;

/// Confidence band derived from the model's numeric self-assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Band a raw score: >= 0.85 high, >= 0.6 medium, else low.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Self::High
        } else if score >= 0.6 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        write!(f, "{name}")
    }
}

/// What the generation capability is asked to produce an answer from.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Fully assembled prompt: numbered snippets, sources, question,
    /// and output-format instructions.
    pub prompt: String,

    /// The user's original question, for logging and correlation.
    pub question: String,
}

/// Raw structured output parsed from the generation capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// The answer text.
    pub answer: String,

    /// Model's numeric confidence in [0, 1].
    pub confidence: f64,

    /// Model's risk assessment ("low", "medium", "high", or free text).
    #[serde(default = "default_risk")]
    pub risk: String,
}

fn default_risk() -> String {
    "unknown".to_string()
}

/// The structured answer returned by `submit_query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text produced by the generation capability.
    pub answer_text: String,

    /// Banded confidence level.
    pub confidence: ConfidenceLevel,

    /// Raw confidence score the band was derived from.
    pub confidence_score: f64,

    /// Risk flag passed through from the generation output.
    pub risk_flag: String,

    /// Citations referencing the chunks that grounded the answer.
    pub citations: Vec<Citation>,

    /// True when retrieval ran without its keyword channel.
    pub degraded_retrieval: bool,
}
