use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which grading persona the prompt uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricMode {
    #[default]
    Standard,
    Advanced,
}

impl From<bool> for RubricMode {
    fn from(use_advanced_rubric: bool) -> Self {
        if use_advanced_rubric {
            RubricMode::Advanced
        } else {
            RubricMode::Standard
        }
    }
}

/// One grading submission. Built per request, never stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub question: String,
    pub ideal_answer: String,
    pub student_answer: String,
    #[serde(default)]
    pub use_advanced_rubric: bool,
}

impl EvaluationRequest {
    pub fn rubric(&self) -> RubricMode {
        RubricMode::from(self.use_advanced_rubric)
    }

    /// Names of the text fields that are empty after trimming.
    pub fn blank_fields(&self) -> Vec<&'static str> {
        [
            ("question", &self.question),
            ("idealAnswer", &self.ideal_answer),
            ("studentAnswer", &self.student_answer),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Set when the model judges the teacher's ideal answer to be wrong (or explicitly right).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdealAnswerCorrection {
    pub is_incorrect: bool,
    pub suggested_correction: String,
    pub explanation: String,
}

/// Normalized grading outcome handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// 0.0 – 10.0, one decimal place
    pub score: f64,
    pub feedback: String,
    pub mistakes: Vec<String>,
    pub strengths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ideal_answer_correction: Option<IdealAnswerCorrection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_alert: Option<String>,
}

/// HTTP envelope around a result. `evaluation_id` is also the log correlation id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResponse {
    pub evaluation_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub rubric: RubricMode,
    #[serde(flatten)]
    pub result: EvaluationResult,
}
