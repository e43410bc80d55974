use serde::{Deserialize, Serialize};

use crate::errors::SchemaError;

/// Maximum number of characters retained in [`PageSnapshot::visible_text`].
pub const MAX_VISIBLE_TEXT_CHARS: usize = 8_000;

/// A structured, truncated view of a page for the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub visible_text: String,
    pub elements: Vec<InteractiveElement>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub meta_description: Option<String>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, title: impl Into<String>, visible_text: impl Into<String>) -> Self {
        let mut snapshot = Self {
            url: url.into(),
            title: title.into(),
            visible_text: visible_text.into(),
            elements: Vec::new(),
            meta_description: None,
        };
        snapshot.truncate_visible_text();
        snapshot
    }

    pub fn truncate_visible_text(&mut self) {
        if self.visible_text.chars().count() > MAX_VISIBLE_TEXT_CHARS {
            self.visible_text = self.visible_text.chars().take(MAX_VISIBLE_TEXT_CHARS).collect();
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.url.trim().is_empty() {
            return Err(SchemaError::invalid("snapshot.url", "must not be empty"));
        }
        if self.visible_text.chars().count() > MAX_VISIBLE_TEXT_CHARS {
            return Err(SchemaError::invalid(
                "snapshot.visible_text",
                format!("must be truncated to at most {MAX_VISIBLE_TEXT_CHARS} characters"),
            ));
        }
        Ok(())
    }
}

/// One interactive element surfaced by the in-page extraction routine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractiveElement {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default, rename = "testId")]
    pub test_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, rename = "readOnly")]
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none", default, rename = "classList")]
    pub class_list: Option<Vec<String>>,
    #[serde(default, rename = "ariaBusy")]
    pub aria_busy: bool,
}

impl InteractiveElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Label derived for display, following the resolution order the
    /// prescan routine uses in the page: aria-label, associated `<label>`,
    /// placeholder, then visible text.
    pub fn label(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.placeholder.as_deref())
            .or(self.name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_visible_text() {
        let long = "a".repeat(MAX_VISIBLE_TEXT_CHARS + 500);
        let snapshot = PageSnapshot::new("http://x", "t", long);
        assert_eq!(snapshot.visible_text.chars().count(), MAX_VISIBLE_TEXT_CHARS);
        assert!(snapshot.validate().is_ok());
    }
}
