use crate::evaluation::Evaluator;
use crate::extraction::PdfExtractor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Grading pipeline over the configured `TextModel` (Gemini in production).
    pub evaluator: Evaluator,
    /// PDF extractor; parser or placeholder mode per PDF_EXTRACTION_MODE.
    pub extractor: PdfExtractor,
}
