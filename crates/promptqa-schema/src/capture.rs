use serde::{Deserialize, Serialize};

/// Per-category caps enforced on every flushed [`CaptureFrame`].
pub const MAX_CONSOLE_ERRORS: usize = 20;
pub const MAX_NETWORK_ERRORS: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Error,
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkFailure {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageError {
    pub message: String,
}

/// Console/network/page-error evidence accumulated during one step.
///
/// Produced only by [`flush`](crate::capture) on the owning collector; lists
/// are always truncated to the per-category caps and network failures always
/// carry `status >= 400`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureFrame {
    pub console_entries: Vec<ConsoleEntry>,
    pub network_failures: Vec<NetworkFailure>,
    pub page_errors: Vec<PageError>,
}

impl CaptureFrame {
    pub fn is_empty(&self) -> bool {
        self.console_entries.is_empty() && self.network_failures.is_empty() && self.page_errors.is_empty()
    }

    pub fn has_any_page_error(&self) -> bool {
        !self.page_errors.is_empty()
    }

    /// A 5xx status observed on a mutating HTTP method (POST/PUT/DELETE).
    pub fn has_hard_network_failure(&self) -> bool {
        self.network_failures.iter().any(|failure| {
            failure.status >= 500
                && matches!(failure.method.to_ascii_uppercase().as_str(), "POST" | "PUT" | "DELETE")
        })
    }

    pub fn truncate(&mut self) {
        self.console_entries.truncate(MAX_CONSOLE_ERRORS);
        self.network_failures.truncate(MAX_NETWORK_ERRORS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_hard_network_failure_only_on_mutation() {
        let mut frame = CaptureFrame::default();
        frame.network_failures.push(NetworkFailure {
            url: "http://x/api".into(),
            status: 500,
            status_text: "Internal Server Error".into(),
            method: "GET".into(),
        });
        assert!(!frame.has_hard_network_failure());

        frame.network_failures.push(NetworkFailure {
            url: "http://x/api".into(),
            status: 502,
            status_text: "Bad Gateway".into(),
            method: "POST".into(),
        });
        assert!(frame.has_hard_network_failure());
    }
}
