use serde::{Deserialize, Serialize};

use crate::errors::SchemaError;
use crate::selector::SelectorHint;

/// Discriminated union of deterministic browser actions, keyed by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Goto {
        value: String,
    },
    Click {
        selector: SelectorHint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Type {
        selector: SelectorHint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Select {
        selector: SelectorHint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Upload {
        selector: SelectorHint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<SelectorHint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    #[serde(rename = "expect_text")]
    ExpectText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<SelectorHint>,
        value: String,
    },
    #[serde(rename = "press_key")]
    PressKey {
        value: String,
    },
}

impl StepKind {
    /// A short machine name, used for report rows and classification.
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Goto { .. } => "goto",
            StepKind::Click { .. } => "click",
            StepKind::Type { .. } => "type",
            StepKind::Select { .. } => "select",
            StepKind::Upload { .. } => "upload",
            StepKind::Wait { .. } => "wait",
            StepKind::ExpectText { .. } => "expect_text",
            StepKind::PressKey { .. } => "press_key",
        }
    }

    pub fn selector(&self) -> Option<&SelectorHint> {
        match self {
            StepKind::Click { selector, .. }
            | StepKind::Type { selector, .. }
            | StepKind::Select { selector, .. }
            | StepKind::Upload { selector, .. } => Some(selector),
            StepKind::Wait { selector, .. } | StepKind::ExpectText { selector, .. } => {
                selector.as_ref()
            }
            StepKind::Goto { .. } | StepKind::PressKey { .. } => None,
        }
    }

    /// True for steps whose success is expected to be evidenced by a changed
    /// page (used by the action-no-effect classifier in the plan-once loop).
    pub fn expects_page_change(&self) -> bool {
        !matches!(
            self,
            StepKind::Goto { .. } | StepKind::Wait { .. } | StepKind::ExpectText { .. }
        )
    }
}

/// One deterministic browser action with a human description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    #[serde(flatten)]
    pub kind: StepKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Step {
    pub fn new(kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            timeout: None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.description.trim().is_empty() {
            return Err(SchemaError::invalid(
                "step.description",
                "must not be empty",
            ));
        }
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err(SchemaError::invalid(
                    "step.timeout",
                    "must be a positive number of milliseconds",
                ));
            }
        }
        if let Some(selector) = self.kind.selector() {
            selector.validate()?;
        }
        match &self.kind {
            StepKind::Goto { value } => {
                if value.trim().is_empty() {
                    return Err(SchemaError::invalid("step.value", "goto requires a URL"));
                }
                url::Url::parse(value)
                    .map_err(|err| SchemaError::invalid("step.value", format!("invalid URL: {err}")))?;
            }
            StepKind::Type { value, .. }
            | StepKind::Select { value, .. }
            | StepKind::Upload { value, .. } => {
                if value.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(SchemaError::invalid(
                        "step.value",
                        format!("{} requires a non-empty value", self.kind.type_name()),
                    ));
                }
            }
            StepKind::Wait { selector, value } => {
                if selector.is_none() {
                    if let Some(value) = value {
                        value.trim().parse::<u64>().map_err(|_| {
                            SchemaError::invalid(
                                "step.value",
                                "wait without a selector requires a numeric millisecond value",
                            )
                        })?;
                    }
                }
            }
            StepKind::ExpectText { value, .. } => {
                if value.trim().is_empty() {
                    return Err(SchemaError::invalid(
                        "step.value",
                        "expect_text requires a non-empty value",
                    ));
                }
            }
            StepKind::PressKey { value } => {
                if value.trim().is_empty() {
                    return Err(SchemaError::invalid(
                        "step.value",
                        "press_key requires a non-empty key name",
                    ));
                }
            }
            StepKind::Click { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectorStrategy;

    fn goto(url: &str) -> Step {
        Step::new(StepKind::Goto { value: url.into() }, "open")
    }

    #[test]
    fn goto_requires_valid_url() {
        assert!(goto("http://example.test").validate().is_ok());
        assert!(goto("not a url").validate().is_err());
    }

    #[test]
    fn type_requires_value() {
        let step = Step::new(
            StepKind::Type {
                selector: SelectorHint::new(SelectorStrategy::Css, "#email"),
                value: None,
            },
            "fill email",
        );
        assert!(step.validate().is_err());
    }

    #[test]
    fn click_does_not_require_value() {
        let step = Step::new(
            StepKind::Click {
                selector: SelectorHint::new(SelectorStrategy::Css, "#submit"),
                value: None,
            },
            "click submit",
        );
        assert!(step.validate().is_ok());
    }

    #[test]
    fn empty_description_is_invalid() {
        let step = Step::new(StepKind::PressKey { value: "Enter".into() }, "");
        assert!(step.validate().is_err());
    }

    #[test]
    fn serde_round_trip_uses_type_tag() {
        let step = goto("http://example.test");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "goto");
        let back: Step = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }
}
