//! Application Configuration Module
//!
//! This module centralizes the configuration for the interviewer service.
//! It loads settings from environment variables and provides a single,
//! shareable struct that can be passed throughout the application.

use preppal_core::evaluation::EvaluationFormat;
use preppal_core::scheduler::DEFAULT_TICK_INTERVAL;
use secrecy::SecretString;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Default sampling temperature for every stage.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Groq,
    OpenAI,
}

impl LlmProvider {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "groq" => Ok(LlmProvider::Groq),
            "openai" => Ok(LlmProvider::OpenAI),
            other => Err(ConfigError::InvalidValue(
                "LLM_PROVIDER".to_string(),
                format!("'{other}' is not one of gemini, groq, openai"),
            )),
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn key_var(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::Groq => "GROQ_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.5-flash",
            LlmProvider::Groq => "llama-3.3-70b-versatile",
            LlmProvider::OpenAI => "gpt-4o",
        }
    }
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: LlmProvider,
    pub api_key: SecretString,
    pub chat_model: String,
    pub temperature: f32,
    pub tick_interval: Duration,
    pub evaluation_format: EvaluationFormat,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `LLM_PROVIDER`: "gemini", "groq" or "openai". Defaults to "gemini".
    /// *   `GEMINI_API_KEY` / `GROQ_API_KEY` / `OPENAI_API_KEY`: Required for the selected provider.
    /// *   `CHAT_MODEL`: (Optional) Model name. Defaults per provider.
    /// *   `MODEL_TEMPERATURE`: (Optional) Between 0 and 2. Defaults to 0.2.
    /// *   `TICK_INTERVAL_MS`: (Optional) Batch period. Defaults to 3000.
    /// *   `EVALUATION_FORMAT`: (Optional) "scored" or "feedback". Defaults to "scored".
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let provider = match lookup("LLM_PROVIDER") {
            Some(value) => LlmProvider::parse(&value)?,
            None => LlmProvider::Gemini,
        };

        let api_key = lookup(provider.key_var())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::MissingVar(format!(
                    "{} must be set for the selected provider",
                    provider.key_var()
                ))
            })?;

        let chat_model =
            lookup("CHAT_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let temperature = match lookup("MODEL_TEMPERATURE") {
            Some(value) => value
                .parse::<f32>()
                .ok()
                .filter(|t| (0.0..=2.0).contains(t))
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "MODEL_TEMPERATURE".to_string(),
                        format!("'{value}' is not a number between 0 and 2"),
                    )
                })?,
            None => DEFAULT_TEMPERATURE,
        };

        let tick_interval = match lookup("TICK_INTERVAL_MS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "TICK_INTERVAL_MS".to_string(),
                        format!("'{value}' is not a positive number of milliseconds"),
                    )
                })?,
            None => DEFAULT_TICK_INTERVAL,
        };

        let evaluation_format = match lookup("EVALUATION_FORMAT").as_deref() {
            None | Some("scored") => EvaluationFormat::Scored,
            Some("feedback") => EvaluationFormat::FeedbackOnly,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "EVALUATION_FORMAT".to_string(),
                    format!("'{other}' is not one of scored, feedback"),
                ));
            }
        };

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            provider,
            api_key: SecretString::from(api_key),
            chat_model,
            temperature,
            tick_interval,
            evaluation_format,
            log_level,
        })
    }
}
