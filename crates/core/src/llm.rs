use crate::prompt::{PromptTemplate, TemplateVars};
use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

/// A single completion call: the fully rendered prompt and the sampling temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
}

// The `LanguageModel` trait is the one seam between the interview pipeline and
// whichever provider (Gemini, Groq, a test double) is selected at session start.
// Pipeline stages only ever see this trait, so swapping the backend never
// touches the scheduler or the stage logic.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends the prompt and returns the model's text output.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Short provider/model label used in logs.
    fn name(&self) -> String;
}

/// A prompt template bound to a model and a temperature.
///
/// `invoke` is the uniform "template variables in, text out" call every stage makes.
#[derive(Clone)]
pub struct Chain {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    temperature: f32,
}

impl Chain {
    pub fn new(model: Arc<dyn LanguageModel>, template: PromptTemplate, temperature: f32) -> Self {
        Self {
            model,
            template,
            temperature,
        }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub async fn invoke(&self, vars: &TemplateVars) -> Result<String> {
        let prompt = self
            .template
            .render(vars)
            .context("Failed to render prompt template")?;
        tracing::trace!("Prompt for {}: {}", self.model.name(), prompt);

        self.model
            .complete(CompletionRequest {
                prompt,
                temperature: self.temperature,
            })
            .await
            .with_context(|| format!("Language model '{}' call failed", self.model.name()))
    }
}
