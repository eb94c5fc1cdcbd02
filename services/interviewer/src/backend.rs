use crate::config::{Config, LlmProvider};
use crate::gemini_adapter::GeminiModel;
use crate::openai_adapter::ChatCompletionsModel;
use preppal_core::llm::LanguageModel;
use std::sync::Arc;

/// Failures talking to a model provider.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request to model provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Model provider returned HTTP {0}: {1}")]
    Status(u16, String),
    #[error("Model provider returned no completion")]
    EmptyCompletion,
}

/// Builds the language model selected by the configuration.
pub fn connect(config: &Config) -> Arc<dyn LanguageModel> {
    let model: Arc<dyn LanguageModel> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiModel::new(
            config.api_key.clone(),
            &config.chat_model,
        )),
        LlmProvider::Groq => Arc::new(ChatCompletionsModel::groq(
            config.api_key.clone(),
            &config.chat_model,
        )),
        LlmProvider::OpenAI => Arc::new(ChatCompletionsModel::openai(
            config.api_key.clone(),
            &config.chat_model,
        )),
    };
    tracing::info!("Using language model {}", model.name());
    model
}
