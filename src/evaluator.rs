//! Calls the LLM with one step's observed evidence and produces a
//! deterministic-shaped `{result, confidence, reason}` verdict, falling
//! back to UNCERTAIN rather than propagating a parse failure.

use promptqa_schema::{EvaluationResult, StepExecutionResult, Verdict};
use serde::Deserialize;

use crate::llm::json_extract::extract_json_object;
use crate::llm::LlmClient;
use crate::prompts::{render, Template};

const SYSTEM: &str = "You are a strict QA evaluator. Respond with a single JSON object only.";

/// Evaluates one step result. Never returns `Err` for an LLM parse
/// failure — evaluator failures degrade to an UNCERTAIN fallback rather
/// than aborting the run. `Err` is reserved for
/// LLM transport failures, which the caller may choose to warn and skip.
pub async fn evaluate(llm: &dyn LlmClient, result: &StepExecutionResult) -> EvaluationResult {
    let rendered = render_evaluator_prompt(result);

    let raw = match llm.generate(SYSTEM, &rendered).await {
        Ok(raw) => raw,
        Err(err) => return EvaluationResult::uncertain_fallback(format!("evaluator transport error: {err}")),
    };

    if let Some(parsed) = try_parse(&raw) {
        return parsed;
    }

    let repair_prompt = render(
        Template::Evaluator,
        &[
            ("description", &format!("{} (previous response was not valid JSON: {raw})", result.step.description)),
            ("expectedAction", &expected_action(result)),
            ("outcome", &outcome_label(result)),
            ("url", &result.url),
            ("visibleText", &result.visible_text),
            ("consoleErrors", &format_console_errors(result)),
            ("networkFailures", &format_network_failures(result)),
            ("pageErrors", &format_page_errors(result)),
        ],
    );
    let repaired = match llm.generate(SYSTEM, &repair_prompt).await {
        Ok(raw) => raw,
        Err(err) => return EvaluationResult::uncertain_fallback(format!("evaluator transport error: {err}")),
    };

    try_parse(&repaired).unwrap_or_else(|| EvaluationResult::uncertain_fallback("Evaluator failed to produce a valid response"))
}

fn render_evaluator_prompt(result: &StepExecutionResult) -> String {
    render(
        Template::Evaluator,
        &[
            ("description", &result.step.description),
            ("expectedAction", &expected_action(result)),
            ("outcome", &outcome_label(result)),
            ("url", &result.url),
            ("visibleText", &result.visible_text),
            ("consoleErrors", &format_console_errors(result)),
            ("networkFailures", &format_network_failures(result)),
            ("pageErrors", &format_page_errors(result)),
        ],
    )
}

fn expected_action(result: &StepExecutionResult) -> String {
    format!("{}: {}", result.step.type_name(), result.step.description)
}

/// Deterministic, non-LLM check: a non-null reason means the step itself
/// failed, an uncaught page error was observed, or a 5xx status appeared
/// on a mutating request (POST/PUT/DELETE). Folded into the `outcome`
/// field the evaluator prompt renders, so the judge sees hard evidence
/// alongside its own reading of the page — it never overrides the verdict
/// the LLM returns.
fn detect_hard_fail(result: &StepExecutionResult) -> Option<String> {
    if !result.success {
        return Some(format!("the {} step failed to execute", result.step.type_name()));
    }
    if result.capture.has_any_page_error() {
        return Some("an uncaught page error was observed".to_string());
    }
    if result.capture.has_hard_network_failure() {
        return Some("a 5xx response was observed on a mutating request".to_string());
    }
    None
}

fn outcome_label(result: &StepExecutionResult) -> String {
    let base = if result.success { "success" } else { "failure" };
    match detect_hard_fail(result) {
        Some(reason) => format!("{base} (hard-fail signal: {reason})"),
        None => base.to_string(),
    }
}

fn format_console_errors(result: &StepExecutionResult) -> String {
    result.capture.console_entries.iter().map(|entry| format!("[{:?}] {}", entry.level, entry.text)).collect::<Vec<_>>().join("\n")
}

fn format_network_failures(result: &StepExecutionResult) -> String {
    result
        .capture
        .network_failures
        .iter()
        .map(|failure| format!("{} {} -> {}", failure.method, failure.url, failure.status))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_page_errors(result: &StepExecutionResult) -> String {
    result.capture.page_errors.iter().map(|error| error.message.clone()).collect::<Vec<_>>().join("\n")
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    result: Verdict,
    confidence: f64,
    reason: String,
}

fn try_parse(raw: &str) -> Option<EvaluationResult> {
    let extracted = extract_json_object(raw);
    let parsed: RawEvaluation = serde_json::from_str(&extracted).ok()?;
    let evaluation = EvaluationResult::new(parsed.result, parsed.confidence, parsed.reason);
    evaluation.validate().ok()?;
    Some(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptqa_schema::{CaptureFrame, SelectorHint, Step, StepKind};

    fn result() -> StepExecutionResult {
        StepExecutionResult {
            step_index: 0,
            step: Step::new(StepKind::Click { selector: SelectorHint::css("#go"), value: None }, "click go"),
            success: true,
            url: "http://example.test".into(),
            screenshot_path: None,
            visible_text: "Welcome".into(),
            capture: CaptureFrame::default(),
            evaluation: None,
        }
    }

    #[tokio::test]
    async fn parses_valid_response() {
        let llm = crate::llm::MockLlmClient::new(vec![
            serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
        ]);
        let evaluation = evaluate(&llm, &result()).await;
        assert_eq!(evaluation.result, Verdict::Pass);
    }

    #[tokio::test]
    async fn falls_back_to_uncertain_after_two_bad_responses() {
        let llm = crate::llm::MockLlmClient::new(vec!["nope".to_string(), "still nope".to_string()]);
        let evaluation = evaluate(&llm, &result()).await;
        assert_eq!(evaluation.result, Verdict::Uncertain);
        assert_eq!(evaluation.confidence, 0.0);
    }

    #[tokio::test]
    async fn recovers_via_repair_attempt() {
        let llm = crate::llm::MockLlmClient::new(vec![
            "nope".to_string(),
            serde_json::json!({ "result": "FAIL", "confidence": 0.5, "reason": "broken" }).to_string(),
        ]);
        let evaluation = evaluate(&llm, &result()).await;
        assert_eq!(evaluation.result, Verdict::Fail);
    }

    #[test]
    fn clamps_out_of_range_confidence() {
        let raw = serde_json::json!({ "result": "PASS", "confidence": 5.0, "reason": "ok" }).to_string();
        let parsed = try_parse(&raw).unwrap();
        assert_eq!(parsed.confidence, 1.0);
    }

    #[test]
    fn detect_hard_fail_reports_reason_on_step_failure() {
        let mut failed = result();
        failed.success = false;
        assert!(detect_hard_fail(&failed).is_some());
    }

    #[test]
    fn detect_hard_fail_reports_reason_on_page_error() {
        use promptqa_schema::PageError;

        let mut errored = result();
        errored.capture.page_errors.push(PageError { message: "TypeError: boom".into() });
        assert!(detect_hard_fail(&errored).is_some());
    }

    #[test]
    fn detect_hard_fail_reports_reason_on_5xx_mutation() {
        use promptqa_schema::NetworkFailure;

        let mut failed_request = result();
        failed_request.capture.network_failures.push(NetworkFailure {
            url: "http://example.test/api".into(),
            status: 503,
            status_text: "Service Unavailable".into(),
            method: "POST".into(),
        });
        assert!(detect_hard_fail(&failed_request).is_some());
    }

    #[test]
    fn detect_hard_fail_is_none_on_clean_success() {
        assert_eq!(detect_hard_fail(&result()), None);
    }

    #[test]
    fn outcome_label_includes_hard_fail_reason_when_present() {
        let mut failed = result();
        failed.success = false;
        assert!(outcome_label(&failed).contains("hard-fail signal"));
        assert_eq!(outcome_label(&result()), "success");
    }
}
