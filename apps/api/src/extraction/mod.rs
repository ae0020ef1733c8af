// Document Text Extractor: PDF validation, per-page parsing, batch isolation.
// Parsing is CPU-bound and must run inside tokio::task::spawn_blocking.

pub mod extractor;
pub mod handlers;
pub mod validation;

// Re-export the public API consumed by other modules (config, errors, main).
pub use extractor::{ExtractionError, ExtractionMode, PdfExtractor};
