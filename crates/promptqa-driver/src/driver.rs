use async_trait::async_trait;
use promptqa_schema::{CaptureFrame, InteractiveElement, SelectorHint};

use crate::errors::DriverError;

/// One browser page, decoupled from chromiumoxide so the rest of the crate
/// (selector resolver, prescan, runner) can be exercised against a fake.
#[async_trait]
pub trait DriverPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn title(&self) -> Result<String, DriverError>;

    /// Full visible (rendered) text of the document body.
    async fn visible_text(&self) -> Result<String, DriverError>;

    /// `<meta name="description">` content, if present.
    async fn meta_description(&self) -> Result<Option<String>, DriverError>;

    /// Enumerate interactive elements for prescan: buttons, links, inputs,
    /// selects, textareas, and anything carrying `data-testid` or `role`.
    async fn interactive_elements(&self) -> Result<Vec<InteractiveElement>, DriverError>;

    async fn click(&self, hint: &SelectorHint) -> Result<(), DriverError>;

    async fn type_text(&self, hint: &SelectorHint, text: &str) -> Result<(), DriverError>;

    async fn select(&self, hint: &SelectorHint, value: &str) -> Result<(), DriverError>;

    async fn set_input_files(&self, hint: &SelectorHint, path: &str) -> Result<(), DriverError>;

    async fn press_key(&self, key: &str) -> Result<(), DriverError>;

    /// Wait for a selector to appear, or for a fixed millisecond delay when
    /// `hint` is absent.
    async fn wait_for(&self, hint: Option<&SelectorHint>, timeout_ms: u64) -> Result<(), DriverError>;

    /// Wait for the page's visible text to contain `needle`.
    async fn expect_text(&self, hint: Option<&SelectorHint>, needle: &str, timeout_ms: u64) -> Result<(), DriverError>;

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError>;

    /// Attaches pre-auth cookies to the page before any navigation.
    async fn add_cookies(&self, cookies: &[(String, String)], url: &str) -> Result<(), DriverError>;

    /// Drain everything the capture collector has observed since the last
    /// flush and reset it for the next step.
    async fn flush_capture(&self) -> CaptureFrame;
}
