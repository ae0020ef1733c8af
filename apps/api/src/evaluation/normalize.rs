//! Response Normalizer: turns the model's free-text reply into an `EvaluationResult`.
//!
//! The model is asked for bare JSON but is not trusted to comply, so the first
//! `{` … last `}` span is cut out of the reply before parsing. Every field is
//! then defaulted independently; the result is either complete or an error.

use serde_json::{Map, Value};

use crate::evaluation::evaluator::EvaluationError;
use crate::evaluation::models::{EvaluationResult, IdealAnswerCorrection};

pub const DEFAULT_FEEDBACK: &str = "No feedback provided.";
pub const MAX_SCORE: f64 = 10.0;

/// Returns the greedy brace-delimited span of `text`, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extracts, parses and normalizes a raw model reply.
pub fn parse_evaluation(raw: &str) -> Result<EvaluationResult, EvaluationError> {
    let json = extract_json_object(raw).ok_or(EvaluationError::NoJsonFound)?;
    let object: Map<String, Value> =
        serde_json::from_str(json).map_err(EvaluationError::MalformedJson)?;
    Ok(normalize_result(&object))
}

pub fn normalize_result(object: &Map<String, Value>) -> EvaluationResult {
    EvaluationResult {
        score: normalize_score(object.get("score")),
        feedback: object
            .get("feedback")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FEEDBACK)
            .to_string(),
        mistakes: non_blank_strings(object.get("mistakes")),
        strengths: non_blank_strings(object.get("strengths")),
        ideal_answer_correction: object
            .get("idealAnswerCorrection")
            .filter(|v| !v.is_null())
            .map(normalize_correction),
        teacher_alert: object
            .get("teacherAlert")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
    }
}

/// Numeric (or numeric-string) score clamped to 0–10 and rounded to one decimal.
fn normalize_score(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .unwrap_or(0.0);

    (raw.clamp(0.0, MAX_SCORE) * 10.0).round() / 10.0
}

fn non_blank_strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_correction(value: &Value) -> IdealAnswerCorrection {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    IdealAnswerCorrection {
        is_incorrect: value
            .get("isIncorrect")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        suggested_correction: text("suggestedCorrection"),
        explanation: text("explanation"),
    }
}
