// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments.

/// Output contract appended to prompts whose reply is parsed as JSON.
/// Gemini has no separate system channel in our calls, so this travels in the prompt body.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    RESPOND STRICTLY IN THE JSON FORMAT BELOW. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
