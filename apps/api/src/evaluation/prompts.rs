// All LLM prompt text for the Evaluation module.
// Reuses the JSON output contract from llm_client::prompts.

use crate::evaluation::models::{EvaluationRequest, RubricMode};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;

/// Persona for the default grading mode.
pub const STANDARD_PERSONA: &str = "\
You are a SUPER INTELLIGENT teacher assistant with expertise across all academic subjects. Your primary responsibilities:
1. CRITICALLY EXAMINE the provided \"ideal answer\" for accuracy and correctness
2. If you detect the ideal answer is incorrect, immediately flag this and provide the correct answer
3. Evaluate the student's answer against the ACTUALLY CORRECT answer
4. Provide constructive, intelligent feedback that helps both student and teacher
5. Act as a quality control system to prevent propagation of incorrect information";

/// Persona for the advanced rubric mode.
pub const ADVANCED_PERSONA: &str = "\
You are a SUPER INTELLIGENT academic evaluator and teacher assistant with PhD-level expertise across all subjects. Your job is to:
1. FIRST analyze if the provided \"ideal answer\" is actually correct
2. If the ideal answer is wrong, provide the correct answer and alert the teacher
3. Then evaluate the student's answer against the CORRECT answer (not the potentially wrong ideal answer)
4. Use advanced rubric criteria: accuracy, depth, clarity, structure, and critical thinking
5. Be extremely thorough and catch any errors in the teacher's provided materials";

/// Evaluation prompt template. Placeholders: `{persona}`, `{json_only}`,
/// `{question}`, `{ideal_answer}`, `{student_answer}`.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"{persona}

CRITICAL INSTRUCTION: You must verify the correctness of the teacher's "ideal answer" before evaluating the student.

---

Question: {question}

Teacher's Provided "Ideal Answer": {ideal_answer}

Student's Answer: {student_answer}

---

EVALUATION PROCESS:
1. FIRST: Analyze if the teacher's "ideal answer" is factually correct for the given question
2. If the ideal answer is WRONG, flag it and provide the correct answer
3. Then evaluate the student's answer against the CORRECT answer (not the wrong ideal answer)
4. Provide comprehensive feedback

{json_only}

{
  "idealAnswerCorrection": {
    "isIncorrect": true/false,
    "suggestedCorrection": "correct answer if ideal answer is wrong, empty string if correct",
    "explanation": "explanation of why ideal answer is wrong, empty string if correct"
  },
  "teacherAlert": "alert message for teacher if ideal answer is wrong, empty string if correct",
  "score": 0-10,
  "feedback": "comprehensive 2-3 sentence feedback based on CORRECT answer",
  "mistakes": ["mistake 1", "mistake 2", "mistake 3"],
  "strengths": ["strength 1", "strength 2", "strength 3"]
}

EXAMPLES OF EXPECTED BEHAVIOR:
- If question is "1+1?" and ideal answer is "4" but student says "2", flag the ideal answer as wrong and give the student full marks
- If question is "Capital of France?" and ideal answer is "London" but student says "Paris", flag the ideal answer and give the student full marks
- If question is "What is H2O?" and ideal answer is "Carbon Dioxide" but student says "Water", flag the ideal answer and give the student full marks
- Always prioritize factual accuracy over blind adherence to provided "ideal" answers

BE EXTREMELY THOROUGH. CATCH ALL ERRORS.
"#;

pub fn persona(mode: RubricMode) -> &'static str {
    match mode {
        RubricMode::Standard => STANDARD_PERSONA,
        RubricMode::Advanced => ADVANCED_PERSONA,
    }
}

/// Renders the grading prompt for a request.
pub fn build_evaluation_prompt(request: &EvaluationRequest) -> String {
    fill_template(
        EVALUATION_PROMPT_TEMPLATE,
        &[
            ("persona", persona(request.rubric())),
            ("json_only", JSON_ONLY_INSTRUCTION),
            ("question", request.question.trim()),
            ("ideal_answer", request.ideal_answer.trim()),
            ("student_answer", request.student_answer.trim()),
        ],
    )
}

/// Single-pass `{name}` substitution. Values are inserted verbatim and never
/// rescanned, so answer text containing `{question}` stays literal.
/// Unknown `{...}` sequences (the JSON example) are left untouched.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replacement = after.find('}').and_then(|end| {
            let key = &after[..end];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });

        match replacement {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
