//! The three language-model stages run by every batch: summarize, interview, evaluate.
//!
//! Each stage is a trait so the scheduler can be driven by test doubles, plus one
//! `Chain`-backed implementation used in production.

use crate::INTERVIEW_BUDGET_MINUTES;
use crate::evaluation::{EvaluationFormat, EvaluationMode, EvaluationResult, parse_evaluation};
use crate::llm::{Chain, LanguageModel};
use crate::prompt::{PromptTemplate, vars};
use crate::session::SessionConfig;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryInput {
    pub recent_history: String,
    pub existing_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewInput {
    pub batched_input: String,
    pub recent_history: String,
    pub summary: String,
    pub workspace: String,
    pub elapsed_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationInput {
    pub elapsed_minutes: u64,
    pub summary: String,
    pub workspace: String,
    pub recent_turns: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Returns the updated rolling summary.
    async fn summarize(&self, input: SummaryInput) -> Result<String>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Interviewer: Send + Sync {
    /// Returns the interviewer's next utterance. An empty string means "stay quiet".
    async fn respond(&self, input: InterviewInput) -> Result<String>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Returns `None` when the model produced nothing usable.
    async fn evaluate(&self, input: EvaluationInput) -> Result<Option<EvaluationResult>>;
}

// --- Templates ---

const SUMMARIZER_TEMPLATE: &str = r#"You maintain a running summary of a live technical interview.

Existing summary (may be empty on the first update):
{{ summary }}

Conversation so far:
{{ history }}

Rewrite the summary so it captures the candidate's approach, progress, mistakes and
the current interview phase. Keep it under 150 words. Output only the summary text."#;

const INTERVIEWER_TEMPLATE: &str = r#"You are an AI Technical Interviewer interviewing {{ candidate_name }}.

Elapsed interview time: {{ elapsed_time }} minutes (budget: {{ budget }} minutes)
Question: {{ question_title }}
{{ question_description }}

Reference solution notes (never reveal directly):
{{ question_editorial }}

Summary of the interview so far: {{ summary }}
Recent conversation: {{ history }}
Candidate's current code:
{{ workspace }}

Latest input from the candidate: {{ input }}

Run the interview in five phases, paced against the strict {{ budget }}-minute budget:
1. Introduction - ask the candidate to introduce themselves.
2. Problem statement - present the problem and ask for their approach.
3. Coding - let them write the solution; guide only if necessary.
4. Review - discuss edge cases, test cases and optimizations.
5. Follow-up - ask follow-up questions and close gracefully at {{ budget }} minutes.

Rules:
- Speak naturally, like a human interviewer. Keep replies short.
- Give hints, never full solutions.
- Not every input needs a reply. If the candidate is making progress and nothing
  needs to be said, respond with an empty message.
Output only what you would say out loud."#;

const EVALUATOR_INCREMENTAL_TEMPLATE: &str = r#"You evaluate a candidate ({{ candidate_name }}) in a live coding interview
on "{{ question_title }}". Elapsed: {{ elapsed_time }} minutes.

Evaluate ONLY the latest exchange:
{{ recent_turns }}

Current code:
{{ workspace }}

Give exactly one short, actionable suggestion.
{{ output_format }}"#;

const EVALUATOR_FINAL_TEMPLATE: &str = r#"The {{ budget }}-minute interview of {{ candidate_name }} on "{{ question_title }}" has ended
(elapsed: {{ elapsed_time }} minutes).

Evaluate the WHOLE session using this summary:
{{ summary }}

Final code:
{{ workspace }}

Most recent exchange:
{{ recent_turns }}

Give two or three concrete suggestions for improvement.
{{ output_format }}"#;

const SCORED_OUTPUT_FORMAT: &str = r#"Score five metrics from 0 to 10: dsa (problem solving), logic (reasoning),
communication, testing (diverse test cases) and code_cleanliness.
Respond with ONLY this JSON object and no other text:
{"metrics": {"dsa": <0-10>, "logic": <0-10>, "communication": <0-10>, "testing": <0-10>, "code_cleanliness": <0-10>}, "feedback": "<feedback>"}"#;

const FEEDBACK_OUTPUT_FORMAT: &str = "Respond with the feedback as plain text only.";

/// The prompt templates for every stage. Keys match the prompt file stems accepted by `with_overrides`.
#[derive(Debug, Clone)]
pub struct StageTemplates {
    pub summarizer: PromptTemplate,
    pub interviewer: PromptTemplate,
    pub evaluator_incremental: PromptTemplate,
    pub evaluator_final: PromptTemplate,
}

impl Default for StageTemplates {
    fn default() -> Self {
        Self {
            summarizer: PromptTemplate::new(SUMMARIZER_TEMPLATE),
            interviewer: PromptTemplate::new(INTERVIEWER_TEMPLATE),
            evaluator_incremental: PromptTemplate::new(EVALUATOR_INCREMENTAL_TEMPLATE),
            evaluator_final: PromptTemplate::new(EVALUATOR_FINAL_TEMPLATE),
        }
    }
}

impl StageTemplates {
    /// Replaces built-in templates with any of `summarizer`, `interviewer`,
    /// `evaluator_incremental`, `evaluator_final` present in `overrides`.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (key, source) in overrides {
            let slot = match key.as_str() {
                "summarizer" => &mut self.summarizer,
                "interviewer" => &mut self.interviewer,
                "evaluator_incremental" => &mut self.evaluator_incremental,
                "evaluator_final" => &mut self.evaluator_final,
                other => {
                    tracing::warn!("Ignoring unknown prompt '{}'", other);
                    continue;
                }
            };
            let template = PromptTemplate::new(source.clone());
            if let Err(e) = template.validate() {
                tracing::warn!("Keeping built-in '{}' prompt; override is invalid: {}", key, e);
                continue;
            }
            tracing::info!("Using prompt override for '{}'", key);
            *slot = template;
        }
        self
    }
}

// --- Chain-backed stages ---

pub struct SummarizerStage {
    chain: Chain,
}

#[async_trait]
impl Summarizer for SummarizerStage {
    async fn summarize(&self, input: SummaryInput) -> Result<String> {
        // Nothing new to condense: keep whatever summary we already have.
        if input.recent_history.trim().is_empty() {
            return Ok(input.existing_summary);
        }
        let out = self
            .chain
            .invoke(&vars([
                ("summary", input.existing_summary),
                ("history", input.recent_history),
            ]))
            .await?;
        Ok(out.trim().to_string())
    }
}

pub struct InterviewerStage {
    chain: Chain,
    session: SessionConfig,
}

#[async_trait]
impl Interviewer for InterviewerStage {
    async fn respond(&self, input: InterviewInput) -> Result<String> {
        let question = &self.session.question;
        let out = self
            .chain
            .invoke(&vars([
                ("input", input.batched_input),
                ("history", input.recent_history),
                ("summary", input.summary),
                ("workspace", input.workspace),
                ("candidate_name", self.session.candidate_name.clone()),
                ("elapsed_time", input.elapsed_minutes.to_string()),
                ("budget", INTERVIEW_BUDGET_MINUTES.to_string()),
                ("question_title", question.title.clone()),
                ("question_description", question.description.clone()),
                ("question_editorial", question.editorial.clone()),
            ]))
            .await?;
        Ok(normalize_utterance(&out))
    }
}

// Models asked for "an empty message" sometimes answer with a pair of quotes.
fn normalize_utterance(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "\"\"" || trimmed == "''" {
        String::new()
    } else {
        trimmed.to_string()
    }
}

pub struct EvaluatorStage {
    incremental: Chain,
    final_review: Chain,
    format: EvaluationFormat,
    session: SessionConfig,
}

#[async_trait]
impl Evaluator for EvaluatorStage {
    async fn evaluate(&self, input: EvaluationInput) -> Result<Option<EvaluationResult>> {
        let mode = EvaluationMode::for_elapsed(input.elapsed_minutes);
        let chain = match mode {
            EvaluationMode::Incremental => &self.incremental,
            EvaluationMode::Final => &self.final_review,
        };
        let output_format = match self.format {
            EvaluationFormat::Scored => SCORED_OUTPUT_FORMAT,
            EvaluationFormat::FeedbackOnly => FEEDBACK_OUTPUT_FORMAT,
        };
        // The format text is spliced in as a value, so its braces are never re-parsed.
        let raw = chain
            .invoke(&vars([
                ("elapsed_time", input.elapsed_minutes.to_string()),
                ("budget", INTERVIEW_BUDGET_MINUTES.to_string()),
                ("summary", input.summary),
                ("workspace", input.workspace),
                ("recent_turns", input.recent_turns),
                ("question_title", self.session.question.title.clone()),
                ("candidate_name", self.session.candidate_name.clone()),
                ("output_format", output_format.to_string()),
            ]))
            .await?;
        Ok(parse_evaluation(&raw, mode, self.format))
    }
}

/// The three stages for one session, built once at session start.
#[derive(Clone)]
pub struct PipelineHandles {
    pub summarizer: Arc<dyn Summarizer>,
    pub interviewer: Arc<dyn Interviewer>,
    pub evaluator: Arc<dyn Evaluator>,
}

impl PipelineHandles {
    pub fn initialize(
        session: &SessionConfig,
        model: Arc<dyn LanguageModel>,
        templates: StageTemplates,
        temperature: f32,
        format: EvaluationFormat,
    ) -> Self {
        tracing::info!(
            "Initializing interview pipeline for {} with {}",
            session.candidate_name,
            model.name()
        );
        let chain = |template: PromptTemplate| Chain::new(model.clone(), template, temperature);

        Self {
            summarizer: Arc::new(SummarizerStage {
                chain: chain(templates.summarizer),
            }),
            interviewer: Arc::new(InterviewerStage {
                chain: chain(templates.interviewer),
                session: session.clone(),
            }),
            evaluator: Arc::new(EvaluatorStage {
                incremental: chain(templates.evaluator_incremental),
                final_review: chain(templates.evaluator_final),
                format,
                session: session.clone(),
            }),
        }
    }
}
