use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::extraction::ExtractionMode;

/// Application configuration loaded from environment variables.
/// Startup fails if the Gemini API key is missing or blank.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub llm_timeout: Duration,
    pub pdf_extraction_mode: ExtractionMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = lookup("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse::<u64>()
            .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?;
        if timeout_secs == 0 {
            bail!("LLM_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Config {
            gemini_api_key: require_env(&lookup, "GEMINI_API_KEY")?,
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            llm_timeout: Duration::from_secs(timeout_secs),
            pdf_extraction_mode: lookup("PDF_EXTRACTION_MODE")
                .as_deref()
                .unwrap_or("parser")
                .parse()
                .context("PDF_EXTRACTION_MODE must be 'parser' or 'placeholder'")?,
        })
    }
}

fn require_env<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => bail!("Required environment variable '{key}' is not set"),
    }
}
