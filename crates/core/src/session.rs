use std::sync::RwLock;

/// The problem the candidate is asked to solve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Question {
    pub title: String,
    pub description: String,
    pub editorial: String,
    pub starter_code: String,
}

/// Everything fixed at session start. Nothing here changes while the interview runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub candidate_name: String,
    pub question: Question,
}

impl SessionConfig {
    pub fn new(candidate_name: impl Into<String>, question: Question) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            question,
        }
    }
}

/// The candidate's current code, owned by the editor collaborator and read by the pipeline.
#[derive(Debug, Default)]
pub struct WorkspaceSnapshot {
    code: RwLock<String>,
}

impl WorkspaceSnapshot {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            code: RwLock::new(initial.into()),
        }
    }

    pub fn current(&self) -> String {
        match self.code.read() {
            Ok(code) => code.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, code: impl Into<String>) {
        let code = code.into();
        match self.code.write() {
            Ok(mut current) => *current = code,
            Err(poisoned) => *poisoned.into_inner() = code,
        }
    }
}
