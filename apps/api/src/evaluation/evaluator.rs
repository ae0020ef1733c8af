//! Evaluation pipeline.
//!
//! Flow: validate request → build prompt (rubric persona) → one model call →
//!       extract JSON → normalize → `EvaluationResponse`.
//!
//! No retries. A failure at any step is terminal for the submission.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::evaluation::models::{EvaluationRequest, EvaluationResponse, EvaluationResult};
use crate::evaluation::normalize::parse_evaluation;
use crate::evaluation::prompts::build_evaluation_prompt;
use crate::llm_client::{LlmError, TextModel};

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    InvalidRequest(Vec<&'static str>),

    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("Analysis failed: no valid JSON found in the model response")]
    NoJsonFound,

    #[error("Analysis failed: JSON parsing failed ({0})")]
    MalformedJson(serde_json::Error),
}

impl EvaluationError {
    /// Message suitable for showing to the teacher in the UI.
    pub fn user_message(&self) -> String {
        match self {
            EvaluationError::InvalidRequest(fields) => format!(
                "Please fill in the question, ideal answer and student answer (missing: {}).",
                fields.join(", ")
            ),
            EvaluationError::Model(LlmError::EmptyContent) => {
                "Analysis failed: the grading model returned no content.".to_string()
            }
            EvaluationError::Model(e) => e.user_message(),
            EvaluationError::NoJsonFound => {
                "Analysis failed: no valid JSON found in the grading model response.".to_string()
            }
            EvaluationError::MalformedJson(_) => {
                "Analysis failed: the grading model response could not be parsed.".to_string()
            }
        }
    }

    /// True for failures caused by the shape of the model's reply rather than transport.
    pub fn is_analysis_failure(&self) -> bool {
        matches!(
            self,
            EvaluationError::NoJsonFound
                | EvaluationError::MalformedJson(_)
                | EvaluationError::Model(LlmError::EmptyContent)
        )
    }
}

/// Grades one request against the given model.
pub async fn evaluate_answer(
    model: &dyn TextModel,
    request: &EvaluationRequest,
) -> Result<EvaluationResult, EvaluationError> {
    let blank = request.blank_fields();
    if !blank.is_empty() {
        return Err(EvaluationError::InvalidRequest(blank));
    }

    let prompt = build_evaluation_prompt(request);
    debug!("Evaluation prompt ({} chars):\n{}", prompt.len(), prompt);

    let raw = model.generate(&prompt).await?;
    debug!("Raw model reply: {}", raw);

    parse_evaluation(&raw)
}

/// Wraps a model with request ids, timing and logging.
#[derive(Clone)]
pub struct Evaluator {
    model: Arc<dyn TextModel>,
}

impl Evaluator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResponse, EvaluationError> {
        let evaluation_id = Uuid::new_v4();
        let rubric = request.rubric();
        let span = tracing::info_span!("evaluation", %evaluation_id, ?rubric);

        async move {
            let started = std::time::Instant::now();
            info!("Evaluating with {}", self.model.model_name());

            match evaluate_answer(self.model.as_ref(), request).await {
                Ok(result) => {
                    info!(
                        score = result.score,
                        ideal_answer_flagged = result
                            .ideal_answer_correction
                            .as_ref()
                            .is_some_and(|c| c.is_incorrect),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Evaluation complete"
                    );
                    Ok(EvaluationResponse {
                        evaluation_id,
                        evaluated_at: Utc::now(),
                        rubric,
                        result,
                    })
                }
                Err(e) => {
                    warn!("Evaluation failed: {e}");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}
