use thiserror::Error;

/// Failure modes surfaced by the browser driver layer.
///
/// `is_retryable` feeds the classify step directly: it distinguishes
/// failures that are worth a second attempt (the element simply wasn't
/// there yet) from failures that mean the browser itself is unusable.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found for selector {selector}")]
    ElementNotFound { selector: String },

    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {message}")]
    NavigationFailed { url: String, message: String },

    #[error("action had no observable effect: {description}")]
    ActionNoEffect { description: String },

    #[error("browser session crashed: {0}")]
    Crashed(String),

    #[error("chromium protocol error: {0}")]
    Cdp(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Whether the runner should retry the step once before giving up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriverError::ElementNotFound { .. } | DriverError::ActionNoEffect { .. } | DriverError::Timeout { .. }
        )
    }
}
