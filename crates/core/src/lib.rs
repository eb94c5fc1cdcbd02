pub mod aggregator;
pub mod clock;
pub mod code_watcher;
pub mod evaluation;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod scheduler;
pub mod session;
pub mod speech;
pub mod stages;

use crate::evaluation::EvaluationResult;

/// The interview time budget in minutes. Pacing and evaluation mode both key off it.
pub const INTERVIEW_BUDGET_MINUTES: u64 = 45;

/// Represents commands that the core logic (`BatchScheduler`) issues to the runtime.
///
/// This enum is the primary API for decoupling the session's decision-making
/// from the runtime's execution of side effects (like speaking text or showing
/// a score card).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Command the runtime to speak (and reveal) the interviewer's utterance.
    SpeakText(String),
    /// A fresh evaluation of the candidate is available.
    Evaluation(EvaluationResult),
}
