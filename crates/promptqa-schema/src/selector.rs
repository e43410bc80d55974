use serde::{Deserialize, Serialize};

use crate::errors::SchemaError;

/// Locator strategy for a [`SelectorHint`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    Testid,
    Role,
    Text,
    Css,
}

/// Abstract element locator handed to the driver's Selector Resolver.
///
/// Invariant: `strategy == Role` requires `role` to be present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorHint {
    pub strategy: SelectorStrategy,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

impl SelectorHint {
    pub fn new(strategy: SelectorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
            role: None,
            name: None,
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(SelectorStrategy::Css, value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(SelectorStrategy::Text, value)
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.value.trim().is_empty() {
            return Err(SchemaError::invalid("selector.value", "must not be empty"));
        }
        if matches!(self.strategy, SelectorStrategy::Role) && self.role.is_none() {
            return Err(SchemaError::invalid(
                "selector.role",
                "required when strategy is 'role'",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strategy_requires_role() {
        let hint = SelectorHint::new(SelectorStrategy::Role, "submit");
        assert!(hint.validate().is_err());
        let hint = hint.with_role("button");
        assert!(hint.validate().is_ok());
    }

    #[test]
    fn empty_value_is_invalid() {
        let hint = SelectorHint::css("");
        assert!(hint.validate().is_err());
    }
}
