//! In-memory [`DriverPage`] double for integration tests that exercise the
//! runner, prescan and loops without a real Chromium instance.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use promptqa_schema::{CaptureFrame, InteractiveElement, SelectorHint, SelectorStrategy};

use crate::driver::DriverPage;
use crate::errors::DriverError;

#[derive(Debug, Clone)]
pub struct FakePage {
    pub url: String,
    pub title: String,
    pub visible_text: String,
    pub elements: Vec<InteractiveElement>,
}

impl FakePage {
    pub fn new(url: impl Into<String>, title: impl Into<String>, visible_text: impl Into<String>) -> Self {
        Self { url: url.into(), title: title.into(), visible_text: visible_text.into(), elements: Vec::new() }
    }

    pub fn with_elements(mut self, elements: Vec<InteractiveElement>) -> Self {
        self.elements = elements;
        self
    }
}

/// A scripted sequence of pages keyed by URL, with a fixed starting page.
///
/// Actions (`click`, `type_text`, ...) never mutate page state on their
/// own; a test advances the fake to its next page explicitly via
/// [`FakeDriver::set_current`], mirroring how a real page only changes once
/// a handler actually runs client-side JS.
pub struct FakeDriver {
    current: Mutex<FakePage>,
    capture: Arc<Mutex<CaptureFrame>>,
    fail_selectors: Mutex<Vec<String>>,
    action_page_errors: Mutex<Vec<(String, String)>>,
    pub cookies: Mutex<Vec<(String, String)>>,
    action_counts: Mutex<std::collections::HashMap<String, usize>>,
}

impl FakeDriver {
    pub fn new(start: FakePage) -> Self {
        Self {
            current: Mutex::new(start),
            capture: Arc::new(Mutex::new(CaptureFrame::default())),
            fail_selectors: Mutex::new(Vec::new()),
            action_page_errors: Mutex::new(Vec::new()),
            cookies: Mutex::new(Vec::new()),
            action_counts: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Number of times an action (click/type/...) was attempted against
    /// `selector_value`, for asserting retry counts in tests.
    pub fn action_count(&self, selector_value: &str) -> usize {
        self.action_counts.lock().get(selector_value).copied().unwrap_or(0)
    }

    pub fn set_current(&self, page: FakePage) {
        *self.current.lock() = page;
    }

    /// Makes the next resolution of a selector whose `value` matches fail,
    /// to exercise the element-not-found retry path.
    pub fn fail_next_selector(&self, selector_value: impl Into<String>) {
        self.fail_selectors.lock().push(selector_value.into());
    }

    pub fn push_console_error(&self, text: impl Into<String>) {
        self.capture.lock().console_entries.push(promptqa_schema::ConsoleEntry {
            level: promptqa_schema::ConsoleLevel::Error,
            text: text.into(),
        });
    }

    pub fn push_network_failure(&self, status: u16, method: &str, url: &str) {
        self.capture.lock().network_failures.push(promptqa_schema::NetworkFailure {
            url: url.to_string(),
            status,
            status_text: "error".to_string(),
            method: method.to_string(),
        });
    }

    pub fn push_page_error(&self, message: impl Into<String>) {
        self.capture.lock().page_errors.push(promptqa_schema::PageError { message: message.into() });
    }

    /// Arranges for the next action against `selector_value` to succeed but
    /// leave a page error behind, simulating an uncaught exception thrown by
    /// a click handler.
    pub fn queue_page_error_on_action(&self, selector_value: impl Into<String>, message: impl Into<String>) {
        self.action_page_errors.lock().push((selector_value.into(), message.into()));
    }

    fn check_selector(&self, hint: &SelectorHint) -> Result<(), DriverError> {
        *self.action_counts.lock().entry(hint.value.clone()).or_insert(0) += 1;

        let mut fail_list = self.fail_selectors.lock();
        if let Some(position) = fail_list.iter().position(|value| value == &hint.value) {
            fail_list.remove(position);
            return Err(DriverError::ElementNotFound { selector: hint.value.clone() });
        }
        drop(fail_list);

        let mut queued = self.action_page_errors.lock();
        if let Some(position) = queued.iter().position(|(value, _)| value == &hint.value) {
            let (_, message) = queued.remove(position);
            self.capture.lock().page_errors.push(promptqa_schema::PageError { message });
        }
        Ok(())
    }
}

#[async_trait]
impl DriverPage for FakeDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.current.lock().url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.current.lock().url.clone())
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.current.lock().title.clone())
    }

    async fn visible_text(&self) -> Result<String, DriverError> {
        Ok(self.current.lock().visible_text.clone())
    }

    async fn meta_description(&self) -> Result<Option<String>, DriverError> {
        Ok(None)
    }

    async fn interactive_elements(&self) -> Result<Vec<InteractiveElement>, DriverError> {
        Ok(self.current.lock().elements.clone())
    }

    async fn click(&self, hint: &SelectorHint) -> Result<(), DriverError> {
        self.check_selector(hint)
    }

    async fn type_text(&self, hint: &SelectorHint, _text: &str) -> Result<(), DriverError> {
        self.check_selector(hint)
    }

    async fn select(&self, hint: &SelectorHint, _value: &str) -> Result<(), DriverError> {
        self.check_selector(hint)
    }

    async fn set_input_files(&self, hint: &SelectorHint, _path: &str) -> Result<(), DriverError> {
        self.check_selector(hint)
    }

    async fn press_key(&self, _key: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn wait_for(&self, hint: Option<&SelectorHint>, timeout_ms: u64) -> Result<(), DriverError> {
        match hint {
            Some(hint) => self.check_selector(hint).map_err(|_| DriverError::Timeout { what: hint.value.clone(), timeout_ms }),
            None => Ok(()),
        }
    }

    async fn expect_text(&self, _hint: Option<&SelectorHint>, needle: &str, timeout_ms: u64) -> Result<(), DriverError> {
        if self.current.lock().visible_text.contains(needle) {
            Ok(())
        } else {
            Err(DriverError::Timeout { what: format!("text {needle:?}"), timeout_ms })
        }
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn add_cookies(&self, cookies: &[(String, String)], _url: &str) -> Result<(), DriverError> {
        self.cookies.lock().extend(cookies.iter().cloned());
        Ok(())
    }

    async fn flush_capture(&self) -> CaptureFrame {
        let mut guard = self.capture.lock();
        let frame = std::mem::take(&mut *guard);
        frame
    }
}

/// Convenience constructor matching the shape planners expect for a
/// CSS-only click target, used throughout the end-to-end test scenarios.
pub fn css_hint(value: impl Into<String>) -> SelectorHint {
    SelectorHint::new(SelectorStrategy::Css, value)
}
