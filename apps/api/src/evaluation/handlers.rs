use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::warn;

use crate::errors::{AppError, FieldError};
use crate::evaluation::models::{EvaluationRequest, EvaluationResponse};
use crate::extraction::extractor::{TextSource, UploadedFile};
use crate::extraction::handlers::read_upload;
use crate::state::AppState;

/// Form slots, in the order they are reported back.
const SLOTS: [&str; 3] = ["question", "ideal_answer", "student_answer"];

enum SlotInput {
    Text(String),
    File(UploadedFile),
}

/// POST /api/v1/evaluations
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluationRequest>,
) -> Result<Json<EvaluationResponse>, AppError> {
    let response = state.evaluator.evaluate(&req).await?;
    Ok(Json(response))
}

/// POST /api/v1/evaluations/form
///
/// Each slot is either a text field or a PDF file field. Files are extracted
/// before grading; every slot is checked and all problems are reported together.
pub async fn handle_evaluate_form(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<EvaluationResponse>, AppError> {
    let mut inputs: [Option<SlotInput>; 3] = [None, None, None];
    let mut use_advanced_rubric = false;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "use_advanced_rubric" {
            use_advanced_rubric = parse_flag(&field.text().await?);
            continue;
        }

        let Some(index) = SLOTS.iter().position(|slot| *slot == name) else {
            continue;
        };

        let file_name = field.file_name().map(str::to_string);
        match file_name.as_deref() {
            // Browsers send an empty filename for an untouched file input.
            Some("") => continue,
            Some(_) => inputs[index] = Some(SlotInput::File(read_upload(field).await?)),
            None => inputs[index] = Some(SlotInput::Text(field.text().await?)),
        }
    }

    let mut values: [String; 3] = Default::default();
    let mut errors = Vec::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let slot = SLOTS[index];
        match input {
            None => errors.push(FieldError::new(slot, "required")),
            Some(SlotInput::Text(text)) if text.trim().is_empty() => {
                errors.push(FieldError::new(slot, "must not be blank"))
            }
            Some(SlotInput::Text(text)) => values[index] = text,
            Some(SlotInput::File(file)) => match state.extractor.extract(&file).await {
                Ok(extracted) if extracted.text.trim().is_empty() => errors.push(FieldError::new(
                    slot,
                    format!("no text could be extracted from {}", file.name),
                )),
                Ok(extracted) => {
                    if extracted.source == TextSource::Placeholder {
                        warn!("Grading with placeholder text for {}", file.name);
                    }
                    values[index] = extracted.text;
                }
                Err(e) => errors.push(FieldError::new(slot, e.to_string())),
            },
        }
    }

    if !errors.is_empty() {
        return Err(AppError::InvalidFields(errors));
    }

    let [question, ideal_answer, student_answer] = values;
    let request = EvaluationRequest {
        question,
        ideal_answer,
        student_answer,
        use_advanced_rubric,
    };

    let response = state.evaluator.evaluate(&request).await?;
    Ok(Json(response))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    )
}
