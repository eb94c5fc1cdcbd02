use crate::backend::BackendError;
use anyhow::Result;
use async_trait::async_trait;
use preppal_core::llm::{CompletionRequest, LanguageModel};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: Option<String>,
}

/// A `LanguageModel` for any OpenAI-compatible `chat/completions` endpoint.
/// Groq and OpenAI differ only in base URL and key.
pub struct ChatCompletionsModel {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl ChatCompletionsModel {
    pub fn new(base_url: &str, api_key: SecretString, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    pub fn groq(api_key: SecretString, model: &str) -> Self {
        Self::new(GROQ_BASE_URL, api_key, model)
    }

    pub fn openai(api_key: SecretString, model: &str) -> Self {
        Self::new(OPENAI_BASE_URL, api_key, model)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
            "temperature": request.temperature
        })
    }
}

/// Pulls the first choice's text out of a chat completion.
pub fn first_choice_text(response: LlmResponse) -> Result<String, BackendError> {
    response
        .choices
        .into_iter()
        .next()
        .ok_or(BackendError::EmptyCompletion)
        .map(|choice| choice.message.content.unwrap_or_default())
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(BackendError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status(status.as_u16(), body).into());
        }

        let parsed = resp
            .json::<LlmResponse>()
            .await
            .map_err(BackendError::Transport)?;
        Ok(first_choice_text(parsed)?)
    }

    fn name(&self) -> String {
        format!("chat-completions:{}", self.model)
    }
}
