//! Query orchestration: retrieve, prompt, generate, answer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::{
    Answer, ConfidenceLevel, GenerationConfig, GenerationRequest, QueryContext,
};
use crate::domain::ports::Generator;
use crate::services::retriever::Retriever;

/// Answers questions from the indexed corpus.
pub struct QueryService {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl QueryService {
    pub fn new(
        retriever: Arc<Retriever>,
        generator: Arc<dyn Generator>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Answer `question` from the indexed corpus.
    ///
    /// Retrieval feeds a numbered-snippet prompt to the generation
    /// capability under a hard deadline. An empty retrieval short-circuits
    /// to a low-confidence "nothing found" answer without calling the
    /// generator.
    ///
    /// # Errors
    /// Returns `SibylError::GenerationTimeout` when the deadline elapses,
    /// and propagates retrieval and generation failures unchanged.
    pub async fn submit_query(&self, question: &str) -> SibylResult<Answer> {
        let query_id = Uuid::new_v4();

        let retrieval = self.retriever.retrieve(question).await?;
        let context = QueryContext::from_retrieval(retrieval);

        if context.is_empty() {
            warn!(%query_id, question, "no relevant chunks found");
            return Ok(Answer {
                answer_text: "No relevant documents were found for this question.".to_string(),
                confidence: ConfidenceLevel::Low,
                confidence_score: 0.0,
                risk_flag: "unknown".to_string(),
                citations: Vec::new(),
                degraded_retrieval: context.degraded,
            });
        }

        let request = GenerationRequest {
            prompt: Self::build_prompt(question, &context),
            question: question.to_string(),
        };

        let waited_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let output = tokio::time::timeout(self.timeout, self.generator.generate(&request))
            .await
            .map_err(|_| SibylError::GenerationTimeout { waited_ms })??;

        let confidence_score = output.confidence.clamp(0.0, 1.0);
        let confidence = ConfidenceLevel::from_score(confidence_score);

        info!(
            %query_id,
            question,
            citations = context.citations.len(),
            %confidence,
            degraded = context.degraded,
            "query answered"
        );

        Ok(Answer {
            answer_text: output.answer,
            confidence,
            confidence_score,
            risk_flag: output.risk,
            citations: context.citations,
            degraded_retrieval: context.degraded,
        })
    }

    /// Assemble the grounded prompt: numbered snippets with provenance,
    /// then the question and the output contract.
    fn build_prompt(question: &str, context: &QueryContext) -> String {
        let mut prompt = String::from("Answer the question using only these sources:\n\n");

        for (i, hit) in context.hits.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] (document: {}, chunk: {}, source: {})\n{}\n\n",
                i + 1,
                hit.record.chunk.document_id,
                hit.record.chunk.index,
                hit.record.source_url,
                hit.record.chunk.text.trim()
            ));
        }

        prompt.push_str(&format!("Question: {question}\n\n"));
        prompt.push_str(
            "Respond with a JSON object: {\"answer\": \"...\", \"confidence\": 0.0-1.0, \
             \"risk\": \"low|medium|high\"}. If the sources do not answer the question, \
             say so and use low confidence.",
        );

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        Channel, Chunk, GenerationOutput, IndexedRecord, RankedHit, RetrievalResult,
    };
    use chrono::Utc;

    fn hit(doc: &str, index: usize) -> RankedHit {
        RankedHit {
            record: IndexedRecord {
                chunk: Chunk {
                    document_id: doc.to_string(),
                    index,
                    text: format!("snippet from {doc}"),
                    token_count: 3,
                    start_token: 0,
                    end_token: 3,
                    overlaps_previous: false,
                },
                embedding: vec![0.0; 4],
                model_id: "test".to_string(),
                source_url: "direct_input".to_string(),
                ingested_at: Utc::now(),
            },
            score: 0.016,
            rank: index,
            channels: vec![Channel::Vector, Channel::Keyword],
        }
    }

    #[test]
    fn test_prompt_numbers_snippets_and_carries_question() {
        let context = QueryContext::from_retrieval(RetrievalResult {
            hits: vec![hit("policy-a", 0), hit("policy-b", 2)],
            degraded: false,
        });

        let prompt = QueryService::build_prompt("When is the blackout window?", &context);

        assert!(prompt.contains("[1] (document: policy-a, chunk: 0"));
        assert!(prompt.contains("[2] (document: policy-b, chunk: 2"));
        assert!(prompt.contains("Question: When is the blackout window?"));
        assert!(prompt.contains("\"confidence\""));
    }

    #[test]
    fn test_confidence_is_clamped_and_banded() {
        let output = GenerationOutput {
            answer: "a".to_string(),
            confidence: 1.7,
            risk: "low".to_string(),
        };
        let clamped = output.confidence.clamp(0.0, 1.0);
        assert!((clamped - 1.0).abs() < f64::EPSILON);
        assert_eq!(ConfidenceLevel::from_score(clamped), ConfidenceLevel::High);
    }
}
