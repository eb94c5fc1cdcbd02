use crate::backend::BackendError;
use anyhow::Result;
use async_trait::async_trait;
use preppal_core::llm::{CompletionRequest, LanguageModel};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A `LanguageModel` backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiModel {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiModel {
    pub fn new(api_key: SecretString, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.to_string(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{BASE_URL}/{model}:generateContent?key={key}",
            model = self.model,
            key = self.api_key.expose_secret()
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

impl GenerateContentRequest {
    fn from_prompt(request: &CompletionRequest) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

/// Concatenates the text parts of the first candidate.
///
/// A candidate with no text is an empty reply, which the interviewer stage
/// treats as deliberate silence. No candidates at all is an error.
fn extract_text(response: GenerateContentResponse) -> Result<String, BackendError> {
    let candidate = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or(BackendError::EmptyCompletion)?;

    Ok(candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let resp = self
            .client
            .post(self.url())
            .json(&GenerateContentRequest::from_prompt(&request))
            .send()
            .await
            // The key travels in the query string; keep it out of error messages.
            .map_err(|e| BackendError::Transport(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status(status.as_u16(), body).into());
        }

        let parsed = resp
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| BackendError::Transport(e.without_url()))?;
        Ok(extract_text(parsed)?)
    }

    fn name(&self) -> String {
        format!("gemini:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_in_gemini_shape() {
        let request = GenerateContentRequest::from_prompt(&CompletionRequest {
            prompt: "Summarize".to_string(),
            temperature: 0.25,
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Summarize" }] }],
                "generationConfig": { "temperature": 0.25 }
            })
        );
    }

    #[test]
    fn test_text_parts_are_joined() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Good "},{"text":"start."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Good start.");
    }

    #[test]
    fn test_candidate_without_content_is_silence() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"STOP"}]}"#).unwrap();
        assert_eq!(extract_text(response).unwrap(), "");
    }

    #[test]
    fn test_missing_candidates_is_an_error() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(BackendError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_url_targets_selected_model() {
        let model = GeminiModel::new(SecretString::from("k".to_string()), "gemini-2.5-flash");
        assert_eq!(
            model.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent?key=k"
        );
        assert_eq!(model.name(), "gemini:gemini-2.5-flash");
    }
}
