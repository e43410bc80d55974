use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::CaptureFrame;
use crate::errors::SchemaError;
use crate::step::Step;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Uncertain,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Uncertain => "UNCERTAIN",
        }
    }
}

/// Parsed and schema-validated verdict for a single evaluated step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub result: Verdict,
    pub confidence: f64,
    pub reason: String,
}

impl EvaluationResult {
    pub fn new(result: Verdict, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            result,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }

    pub fn uncertain_fallback(reason: impl Into<String>) -> Self {
        Self::new(Verdict::Uncertain, 0.0, reason)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SchemaError::invalid(
                "evaluation.confidence",
                "must be clamped into [0, 1] before validation",
            ));
        }
        if self.reason.trim().is_empty() {
            return Err(SchemaError::invalid("evaluation.reason", "must not be empty"));
        }
        Ok(())
    }
}

/// Outcome of executing one step against the page, with artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepExecutionResult {
    pub step_index: usize,
    pub step: Step,
    pub success: bool,
    pub url: String,
    pub screenshot_path: Option<String>,
    pub visible_text: String,
    pub capture: CaptureFrame,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub evaluation: Option<EvaluationResult>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BugReport {
    pub step_index: usize,
    pub description: String,
    pub severity: Severity,
    pub evidence: Vec<String>,
}

impl BugReport {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.description.trim().is_empty() {
            return Err(SchemaError::invalid("bug.description", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub url: String,
    pub prompt: String,
    pub summary: Verdict,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub steps: Vec<StepExecutionResult>,
    pub bugs: Vec<BugReport>,
    #[serde(default)]
    pub login_failed: bool,
}

/// One entry in the agent loop's running history, formatted for the
/// `agent_step` prompt on the next iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionHistoryEntry {
    pub step_index: usize,
    pub action: String,
    pub description: String,
    pub success: bool,
    pub observation: String,
}

/// Truncate to roughly 200 characters the way the agent loop records an
/// observation string for history replay.
pub fn truncate_observation(raw: &str) -> String {
    const MAX: usize = 200;
    if raw.chars().count() <= MAX {
        raw.to_string()
    } else {
        let mut truncated: String = raw.chars().take(MAX).collect();
        truncated.push('\u{2026}');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped_on_construction() {
        let eval = EvaluationResult::new(Verdict::Pass, 1.8, "ok");
        assert_eq!(eval.confidence, 1.0);
        let eval = EvaluationResult::new(Verdict::Pass, -0.5, "ok");
        assert_eq!(eval.confidence, 0.0);
    }

    #[test]
    fn observation_truncation_is_short_and_marked() {
        let long = "x".repeat(500);
        let truncated = truncate_observation(&long);
        assert!(truncated.chars().count() <= 201);
        assert!(truncated.ends_with('\u{2026}'));
    }
}
