/// One exchange: what the candidate said (the batched input) and what the interviewer answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub input: String,
    pub response: String,
}

impl ConversationTurn {
    pub fn new(input: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            response: response.into(),
        }
    }

    /// Renders the turn as two transcript lines. A silent interviewer turn renders only the candidate line.
    pub fn render(&self) -> String {
        if self.response.is_empty() {
            format!("Candidate said: {}", self.input)
        } else {
            format!(
                "Candidate said: {}\nAssistant said: {}",
                self.input, self.response
            )
        }
    }
}

/// Append-only log of turns plus the rolling summary.
///
/// Turns are never rewritten; only the summary is replaced, once per batch.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
    summary: String,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_turn(&mut self, input: impl Into<String>, response: impl Into<String>) {
        self.turns.push(ConversationTurn::new(input, response));
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All turns as alternating "Candidate said / Assistant said" lines.
    pub fn recent_transcript(&self) -> String {
        self.turns
            .iter()
            .map(ConversationTurn::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_alternates_speakers_in_order() {
        let mut history = ConversationHistory::new();
        history.append_turn("Hi, I'm Ada", "Welcome Ada, tell me about yourself.");
        history.append_turn("I would use a hash map", "");

        assert_eq!(
            history.recent_transcript(),
            "Candidate said: Hi, I'm Ada\n\
             Assistant said: Welcome Ada, tell me about yourself.\n\
             Candidate said: I would use a hash map"
        );
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_empty_history_renders_empty_transcript() {
        let history = ConversationHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.recent_transcript(), "");
        assert_eq!(history.summary(), "");
    }

    #[test]
    fn test_summary_is_replaced_not_appended() {
        let mut history = ConversationHistory::new();
        history.set_summary("Candidate introduced themselves.");
        history.set_summary("Candidate is discussing a hash map approach.");

        assert_eq!(
            history.summary(),
            "Candidate is discussing a hash map approach."
        );
        assert!(history.turns().is_empty());
    }
}
