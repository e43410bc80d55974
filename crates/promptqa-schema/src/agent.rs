use serde::{Deserialize, Serialize};

use crate::errors::SchemaError;
use crate::step::{Step, StepKind};

/// Decision returned by the agent loop's "decide" phase: either the agent
/// declares itself finished, or it names the next action to take.
///
/// `action` reuses [`Step`]'s shape but must never be a `goto` step — the
/// agent loop navigates only once, at bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AgentStepResponse {
    Done { done: DoneMarker, summary: String },
    Act { done: NotDoneMarker, action: Step },
}

/// Serializes/deserializes as the JSON literal `true`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoneMarker;

impl serde::Serialize for DoneMarker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> serde::Deserialize<'de> for DoneMarker {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = bool::deserialize(deserializer)?;
        if value {
            Ok(DoneMarker)
        } else {
            Err(serde::de::Error::custom("expected `done: true`"))
        }
    }
}

/// Serializes/deserializes as the JSON literal `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotDoneMarker;

impl serde::Serialize for NotDoneMarker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(false)
    }
}

impl<'de> serde::Deserialize<'de> for NotDoneMarker {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = bool::deserialize(deserializer)?;
        if value {
            Err(serde::de::Error::custom("expected `done: false`"))
        } else {
            Ok(NotDoneMarker)
        }
    }
}

impl AgentStepResponse {
    pub fn validate(&self) -> Result<(), SchemaError> {
        match self {
            AgentStepResponse::Done { summary, .. } => {
                if summary.trim().is_empty() {
                    return Err(SchemaError::invalid(
                        "agent_step.summary",
                        "must not be empty when done",
                    ));
                }
                Ok(())
            }
            AgentStepResponse::Act { action, .. } => {
                if matches!(action.kind, StepKind::Goto { .. }) {
                    return Err(SchemaError::invalid(
                        "agent_step.action",
                        "the agent loop never re-issues goto; bootstrap navigation only",
                    ));
                }
                action.validate()
            }
        }
    }
}

/// Final-evaluation verdict produced after the agent loop's main sub-loop
/// ends, regardless of whether the agent declared itself done.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentFinalEvaluation {
    pub result: crate::results::Verdict,
    pub confidence: f64,
    pub reason: String,
}

impl AgentFinalEvaluation {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SchemaError::invalid(
                "agent_final.confidence",
                "must be clamped into [0, 1] before validation",
            ));
        }
        if self.reason.trim().is_empty() {
            return Err(SchemaError::invalid("agent_final.reason", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{SelectorHint, SelectorStrategy};

    #[test]
    fn rejects_goto_as_agent_action() {
        let response = AgentStepResponse::Act {
            done: NotDoneMarker,
            action: Step::new(StepKind::Goto { value: "http://x".into() }, "nav"),
        };
        assert!(response.validate().is_err());
    }

    #[test]
    fn accepts_click_action() {
        let response = AgentStepResponse::Act {
            done: NotDoneMarker,
            action: Step::new(
                StepKind::Click {
                    selector: SelectorHint::new(SelectorStrategy::Css, "#go"),
                    value: None,
                },
                "click go",
            ),
        };
        assert!(response.validate().is_ok());
    }

    #[test]
    fn parses_done_variant_from_json() {
        let raw = serde_json::json!({ "done": true, "summary": "Finished checkout." });
        let parsed: AgentStepResponse = serde_json::from_value(raw).unwrap();
        assert!(parsed.validate().is_ok());
        assert!(matches!(parsed, AgentStepResponse::Done { .. }));
    }
}
