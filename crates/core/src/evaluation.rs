use crate::INTERVIEW_BUDGET_MINUTES;
use serde::{Deserialize, Serialize};

/// Which slice of the interview an evaluation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Before the budget elapses: only the latest exchange, one short suggestion.
    Incremental,
    /// Once the budget elapses: the whole session, two or three suggestions.
    Final,
}

impl EvaluationMode {
    pub fn for_elapsed(elapsed_minutes: u64) -> Self {
        if elapsed_minutes < INTERVIEW_BUDGET_MINUTES {
            EvaluationMode::Incremental
        } else {
            EvaluationMode::Final
        }
    }
}

/// What the evaluator is asked to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationFormat {
    /// A JSON record with five 0-10 scores and feedback.
    #[default]
    Scored,
    /// Plain feedback text.
    FeedbackOnly,
}

/// The five scores, each out of 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub dsa: u8,
    pub logic: u8,
    pub communication: u8,
    pub testing: u8,
    pub code_cleanliness: u8,
}

impl Metrics {
    pub const MAX_SCORE: u8 = 10;

    pub fn is_valid(&self) -> bool {
        [
            self.dsa,
            self.logic,
            self.communication,
            self.testing,
            self.code_cleanliness,
        ]
        .iter()
        .all(|score| *score <= Self::MAX_SCORE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    pub mode: EvaluationMode,
    /// Present only when the evaluator produced a well-formed scored record.
    pub metrics: Option<Metrics>,
    pub feedback: String,
}

#[derive(Debug, Deserialize)]
struct ScoredRecord {
    metrics: Metrics,
    #[serde(default)]
    feedback: String,
}

/// Finds the JSON object inside model output that may be wrapped in a markdown
/// fence (with or without an info string) or surrounded by commentary.
///
/// Returns the slice from the first `{` to the last `}`, or `None` when there is no object.
pub fn extract_structured_payload(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let unfenced = strip_code_fence(trimmed).unwrap_or(trimmed);

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| &unfenced[start..=end])
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    // Drop the info string ("json", "JSON", ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let body = body.trim_end();
    Some(body.strip_suffix("```").unwrap_or(body).trim())
}

/// Turns raw evaluator output into a result.
///
/// In scored format a parseable record with in-range scores yields metrics;
/// anything else degrades to a feedback-only result carrying the trimmed text.
/// Empty output yields `None`.
pub fn parse_evaluation(
    raw: &str,
    mode: EvaluationMode,
    format: EvaluationFormat,
) -> Option<EvaluationResult> {
    let text = raw.trim();
    if text.is_empty() {
        tracing::warn!("Evaluator returned empty output; no evaluation published.");
        return None;
    }

    if format == EvaluationFormat::Scored {
        match extract_structured_payload(text).map(serde_json::from_str::<ScoredRecord>) {
            Some(Ok(record)) if record.metrics.is_valid() => {
                return Some(EvaluationResult {
                    mode,
                    metrics: Some(record.metrics),
                    feedback: record.feedback,
                });
            }
            Some(Ok(record)) => {
                tracing::warn!("Evaluator scores out of range: {:?}", record.metrics);
            }
            Some(Err(e)) => {
                tracing::warn!("Evaluator output is not a valid score record: {}", e);
            }
            None => {
                tracing::warn!("Evaluator output contains no JSON object.");
            }
        }
    }

    Some(EvaluationResult {
        mode,
        metrics: None,
        feedback: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_for_logging() {
        let scored = EvaluationResult {
            mode: EvaluationMode::Final,
            metrics: Some(Metrics {
                dsa: 8,
                logic: 7,
                communication: 9,
                testing: 4,
                code_cleanliness: 6,
            }),
            feedback: "Add tests for empty input.".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&scored).unwrap(),
            serde_json::json!({
                "mode": "final",
                "metrics": {"dsa": 8, "logic": 7, "communication": 9, "testing": 4, "code_cleanliness": 6},
                "feedback": "Add tests for empty input."
            })
        );

        let plain = EvaluationResult {
            mode: EvaluationMode::Incremental,
            metrics: None,
            feedback: "Talk through the loop.".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&plain).unwrap(),
            r#"{"mode":"incremental","metrics":null,"feedback":"Talk through the loop."}"#
        );
    }

    const WELL_FORMED: &str = r#"{"metrics":{"dsa":7,"logic":8,"communication":6,"testing":5,"code_cleanliness":9},"feedback":"Add more edge-case tests."}"#;

    #[test]
    fn test_mode_switches_at_budget_boundary() {
        assert_eq!(EvaluationMode::for_elapsed(0), EvaluationMode::Incremental);
        assert_eq!(EvaluationMode::for_elapsed(44), EvaluationMode::Incremental);
        assert_eq!(EvaluationMode::for_elapsed(45), EvaluationMode::Final);
        assert_eq!(EvaluationMode::for_elapsed(90), EvaluationMode::Final);
    }

    #[test]
    fn test_well_formed_record_parses_unchanged() {
        let result =
            parse_evaluation(WELL_FORMED, EvaluationMode::Incremental, EvaluationFormat::Scored)
                .unwrap();

        assert_eq!(
            result.metrics,
            Some(Metrics {
                dsa: 7,
                logic: 8,
                communication: 6,
                testing: 5,
                code_cleanliness: 9,
            })
        );
        assert_eq!(result.feedback, "Add more edge-case tests.");
        assert_eq!(result.mode, EvaluationMode::Incremental);
    }

    #[test]
    fn test_fenced_record_is_unwrapped() {
        let fenced = format!("```json\n{WELL_FORMED}\n```");
        let result =
            parse_evaluation(&fenced, EvaluationMode::Final, EvaluationFormat::Scored).unwrap();
        assert!(result.metrics.is_some());
        assert_eq!(result.mode, EvaluationMode::Final);

        let bare_fence = format!("```\n{WELL_FORMED}```");
        assert_eq!(extract_structured_payload(&bare_fence), Some(WELL_FORMED));
    }

    #[test]
    fn test_record_with_commentary_is_extracted() {
        let chatty = format!("Here is my evaluation:\n{WELL_FORMED}\nGood luck!");
        assert_eq!(extract_structured_payload(&chatty), Some(WELL_FORMED));
    }

    #[test]
    fn test_no_object_yields_none() {
        assert_eq!(extract_structured_payload("no json here"), None);
        assert_eq!(extract_structured_payload("} backwards {"), None);
        assert_eq!(extract_structured_payload("```json\n```"), None);
    }

    #[test]
    fn test_malformed_record_falls_back_to_feedback_only() {
        let raw = "```json\n{\"metrics\": {\"dsa\": 7, \"logic\": }\n```";
        let result =
            parse_evaluation(raw, EvaluationMode::Incremental, EvaluationFormat::Scored).unwrap();
        assert_eq!(result.metrics, None);
        assert_eq!(result.feedback, raw);
    }

    #[test]
    fn test_out_of_range_scores_fall_back_to_feedback_only() {
        let raw = r#"{"metrics":{"dsa":11,"logic":8,"communication":6,"testing":5,"code_cleanliness":9},"feedback":"x"}"#;
        let result =
            parse_evaluation(raw, EvaluationMode::Incremental, EvaluationFormat::Scored).unwrap();
        assert_eq!(result.metrics, None);
    }

    #[test]
    fn test_feedback_format_keeps_text() {
        let result = parse_evaluation(
            "  Try narrating your approach before coding.  ",
            EvaluationMode::Incremental,
            EvaluationFormat::FeedbackOnly,
        )
        .unwrap();
        assert_eq!(result.metrics, None);
        assert_eq!(result.feedback, "Try narrating your approach before coding.");
    }

    #[test]
    fn test_empty_output_yields_no_result() {
        assert!(parse_evaluation("   ", EvaluationMode::Final, EvaluationFormat::Scored).is_none());
    }
}
