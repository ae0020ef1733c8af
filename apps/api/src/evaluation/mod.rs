// Prompt Builder / Response Normalizer.
// One model call per submission; the reply is parsed and defaulted into a fixed shape.

pub mod evaluator;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod prompts;

pub use evaluator::{EvaluationError, Evaluator};
