/// LLM Client: the single point of entry for all Gemini API calls in MarkWise.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All model interactions MUST go through this module, usually via the
/// `TextModel` trait so callers can be exercised against a scripted model.
///
/// Model: gemini-2.0-flash-exp (hardcoded, not configurable)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for every grading call.
pub const MODEL: &str = "gemini-2.0-flash-exp";

/// Low temperature keeps grading consistent between submissions.
pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.1,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 2048,
};

const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Error)]
pub enum LlmError {
    /// Built with the request URL stripped, since the URL carries the API key.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Gemini API error: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid Gemini API key")]
    InvalidApiKey,

    #[error("Gemini API quota exceeded")]
    QuotaExceeded,

    #[error("Gemini blocked the content: {0}")]
    Blocked(String),

    #[error("Gemini request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Gemini returned no content")]
    EmptyContent,

    #[error("Gemini API key is not configured")]
    MissingApiKey,
}

impl LlmError {
    /// Message suitable for showing to the teacher in the UI.
    pub fn user_message(&self) -> String {
        match self {
            LlmError::InvalidApiKey => {
                "Invalid Gemini API key. Please check the server configuration.".to_string()
            }
            LlmError::QuotaExceeded => "API quota exceeded. Try again later.".to_string(),
            LlmError::Blocked(_) => "Gemini blocked the content. Rephrase your input.".to_string(),
            LlmError::Timeout(d) => format!(
                "The grading model did not answer within {}s. Please resubmit.",
                d.as_secs()
            ),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GENERATION_CONFIG,
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: SAFETY_THRESHOLD,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, trimmed.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.first())
            .and_then(|part| part.text.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Converts the response into reply text, surfacing safety blocks and empty replies.
    pub fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(LlmError::Blocked(reason));
        }

        if let Some(text) = self.text() {
            return Ok(text.to_string());
        }

        match self.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            Some(reason @ ("SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                Err(LlmError::Blocked(reason.to_string()))
            }
            _ => Err(LlmError::EmptyContent),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: Option<String>,
}

/// Maps a non-success response onto a typed error.
///
/// Gemini puts the machine-readable reason (`API_KEY_INVALID`, `RESOURCE_EXHAUSTED`)
/// in `status`/`details` rather than the message, so the whole body is searched.
fn classify_api_failure(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<GeminiError>(body)
        .ok()
        .and_then(|e| e.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )
        });

    if body.contains("API_KEY_INVALID") || body.contains("API key not valid") {
        LlmError::InvalidApiKey
    } else if body.contains("QUOTA_EXCEEDED") || body.contains("RESOURCE_EXHAUSTED") {
        LlmError::QuotaExceeded
    } else if body.contains("BLOCKED") {
        LlmError::Blocked(message)
    } else {
        LlmError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Anything that turns a prompt into free-form reply text.
#[async_trait]
pub trait TextModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// The Gemini client used by the evaluation pipeline.
/// One request per call, no retries; the timeout is enforced by the HTTP client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    timeout: Duration,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, timeout, GEMINI_API_BASE)
    }

    /// Same as [`GeminiClient::new`] against a different models root.
    fn with_base_url(
        api_key: String,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Http(e.without_url()))?;

        Ok(Self {
            client,
            api_key,
            timeout,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{MODEL}:generateContent", self.base_url)
    }

    /// Makes a raw call to the Gemini API, returning the full response object.
    pub async fn call(&self, prompt: &str) -> Result<GenerateContentResponse, LlmError> {
        let request_body = GenerateContentRequest::new(prompt);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            warn!("Gemini API returned {}", status);
            return Err(classify_api_failure(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={:?}, output_tokens={:?}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(parsed)
    }

    fn transport_error(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Http(error.without_url())
        }
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    fn model_name(&self) -> &str {
        MODEL
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.call(prompt).await?.into_text()
    }
}
