//! Deterministic retry/hard-fail classification, consulted by the plan-once
//! loop after every step execution.

use promptqa_schema::StepExecutionResult;

/// Outcome of classifying one [`StepExecutionResult`] against the previous
/// step's visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    ElementNotFound,
    ActionNoEffect,
    HardFail,
    None,
}

impl Classification {
    pub fn is_retryable(self) -> bool {
        matches!(self, Classification::ElementNotFound | Classification::ActionNoEffect)
    }
}

/// Classifies `result` given the visible text observed before this step ran.
pub fn classify_failure(result: &StepExecutionResult, prev_visible_text: &str) -> Classification {
    if !result.success {
        return if has_hard_fail_evidence(result) {
            Classification::HardFail
        } else {
            Classification::ElementNotFound
        };
    }

    if has_hard_fail_evidence(result) {
        return Classification::HardFail;
    }

    if result.step.kind.expects_page_change() && result.visible_text == prev_visible_text {
        return Classification::ActionNoEffect;
    }

    Classification::None
}

fn has_hard_fail_evidence(result: &StepExecutionResult) -> bool {
    result.capture.has_any_page_error() || result.capture.has_hard_network_failure()
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptqa_schema::{CaptureFrame, NetworkFailure, PageError, Step, StepKind};

    fn step_result(success: bool, visible_text: &str, capture: CaptureFrame) -> StepExecutionResult {
        StepExecutionResult {
            step_index: 0,
            step: Step::new(StepKind::Click { selector: promptqa_schema::SelectorHint::css("#go"), value: None }, "click"),
            success,
            url: "http://x".into(),
            screenshot_path: None,
            visible_text: visible_text.into(),
            capture,
            evaluation: None,
        }
    }

    #[test]
    fn failed_step_without_hard_evidence_is_element_not_found() {
        let result = step_result(false, "page", CaptureFrame::default());
        assert_eq!(classify_failure(&result, "page"), Classification::ElementNotFound);
    }

    #[test]
    fn failed_step_with_page_error_is_hard_fail() {
        let mut capture = CaptureFrame::default();
        capture.page_errors.push(PageError { message: "boom".into() });
        let result = step_result(false, "page", capture);
        assert_eq!(classify_failure(&result, "page"), Classification::HardFail);
    }

    #[test]
    fn succeeded_step_with_page_error_is_hard_fail() {
        let mut capture = CaptureFrame::default();
        capture.page_errors.push(PageError { message: "boom".into() });
        let result = step_result(true, "page", capture);
        assert_eq!(classify_failure(&result, "page"), Classification::HardFail);
    }

    #[test]
    fn succeeded_step_with_mutating_5xx_is_hard_fail() {
        let mut capture = CaptureFrame::default();
        capture.network_failures.push(NetworkFailure {
            url: "http://x/api".into(),
            status: 500,
            status_text: "Internal Server Error".into(),
            method: "POST".into(),
        });
        let result = step_result(true, "page", capture);
        assert_eq!(classify_failure(&result, "page"), Classification::HardFail);
    }

    #[test]
    fn unchanged_visible_text_on_mutating_step_is_action_no_effect() {
        let result = step_result(true, "same", CaptureFrame::default());
        assert_eq!(classify_failure(&result, "same"), Classification::ActionNoEffect);
    }

    #[test]
    fn changed_visible_text_is_none() {
        let result = step_result(true, "new", CaptureFrame::default());
        assert_eq!(classify_failure(&result, "old"), Classification::None);
    }

    #[test]
    fn goto_never_classifies_as_action_no_effect() {
        let mut result = step_result(true, "same", CaptureFrame::default());
        result.step = Step::new(StepKind::Goto { value: "http://x".into() }, "open");
        assert_eq!(classify_failure(&result, "same"), Classification::None);
    }
}
