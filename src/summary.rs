//! Deterministic summary verdict and bug extraction over a run's step
//! results. Both functions are pure: no LLM call ever influences their
//! output beyond whatever `evaluation` the caller already attached.

use promptqa_schema::{BugReport, Severity, StepExecutionResult, Verdict};

/// Computes the run-level verdict from a step list: FAIL if any step
/// failed or was evaluated FAIL; else UNCERTAIN if any step was evaluated
/// UNCERTAIN; else PASS.
pub fn compute_summary_verdict(steps: &[StepExecutionResult]) -> Verdict {
    let mut saw_uncertain = false;

    for step in steps {
        if !step.success {
            return Verdict::Fail;
        }
        match step.evaluation.as_ref().map(|evaluation| evaluation.result) {
            Some(Verdict::Fail) => return Verdict::Fail,
            Some(Verdict::Uncertain) => saw_uncertain = true,
            Some(Verdict::Pass) | None => {}
        }
    }

    if saw_uncertain {
        Verdict::Uncertain
    } else {
        Verdict::Pass
    }
}

/// Harvests [`BugReport`]s from a run's step results: one per failed step
/// (critical) and one per step evaluated FAIL (critical if page errors were
/// observed, else major).
pub fn extract_bugs(steps: &[StepExecutionResult]) -> Vec<BugReport> {
    steps.iter().filter_map(extract_bug).collect()
}

fn extract_bug(step: &StepExecutionResult) -> Option<BugReport> {
    let evaluation_failed = matches!(step.evaluation.as_ref().map(|evaluation| evaluation.result), Some(Verdict::Fail));

    if !step.success {
        return Some(BugReport {
            step_index: step.step_index,
            description: format!("Step {} ({}) failed: {}", step.step_index, step.step.type_name(), step.step.description),
            severity: Severity::Critical,
            evidence: evidence_lines(step),
        });
    }

    if evaluation_failed {
        let severity = if step.capture.has_any_page_error() { Severity::Critical } else { Severity::Major };
        let reason = step.evaluation.as_ref().map(|evaluation| evaluation.reason.clone()).unwrap_or_default();
        return Some(BugReport {
            step_index: step.step_index,
            description: format!("Step {} ({}) evaluated FAIL: {reason}", step.step_index, step.step.type_name()),
            severity,
            evidence: evidence_lines(step),
        });
    }

    None
}

fn evidence_lines(step: &StepExecutionResult) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in &step.capture.console_entries {
        lines.push(format!("Console error: {}", entry.text));
    }
    for failure in &step.capture.network_failures {
        lines.push(format!("Network {} {} \u{2192} {}", failure.method, failure.url, failure.status));
    }
    for error in &step.capture.page_errors {
        lines.push(format!("Page error: {}", error.message));
    }
    lines
}

/// A synthetic bug record for a planner-stage failure, emitted even though
/// no step was ever executed.
pub fn planner_failure_bug(message: &str) -> BugReport {
    BugReport {
        step_index: 0,
        description: format!("Planner error: {message}"),
        severity: Severity::Critical,
        evidence: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptqa_schema::{CaptureFrame, EvaluationResult, PageError, SelectorHint, Step, StepKind};

    fn step(index: usize, success: bool, evaluation: Option<EvaluationResult>) -> StepExecutionResult {
        StepExecutionResult {
            step_index: index,
            step: Step::new(StepKind::Click { selector: SelectorHint::css("#go"), value: None }, "click"),
            success,
            url: "http://x".into(),
            screenshot_path: None,
            visible_text: "text".into(),
            capture: CaptureFrame::default(),
            evaluation,
        }
    }

    #[test]
    fn all_pass_is_pass() {
        let steps = vec![step(0, true, Some(EvaluationResult::new(Verdict::Pass, 0.9, "ok")))];
        assert_eq!(compute_summary_verdict(&steps), Verdict::Pass);
    }

    #[test]
    fn any_failure_is_fail() {
        let steps = vec![step(0, false, None)];
        assert_eq!(compute_summary_verdict(&steps), Verdict::Fail);
    }

    #[test]
    fn any_eval_fail_is_fail() {
        let steps = vec![step(0, true, Some(EvaluationResult::new(Verdict::Fail, 0.9, "bad")))];
        assert_eq!(compute_summary_verdict(&steps), Verdict::Fail);
    }

    #[test]
    fn uncertain_without_failure_is_uncertain() {
        let steps = vec![
            step(0, true, Some(EvaluationResult::new(Verdict::Pass, 0.9, "ok"))),
            step(1, true, Some(EvaluationResult::new(Verdict::Uncertain, 0.5, "unclear"))),
            step(2, true, Some(EvaluationResult::new(Verdict::Pass, 0.9, "ok"))),
        ];
        assert_eq!(compute_summary_verdict(&steps), Verdict::Uncertain);
    }

    #[test]
    fn extracts_bug_for_failed_step() {
        let steps = vec![step(0, false, None)];
        let bugs = extract_bugs(&steps);
        assert_eq!(bugs.len(), 1);
        assert_eq!(bugs[0].severity, Severity::Critical);
    }

    #[test]
    fn extracts_major_bug_for_eval_fail_without_page_errors() {
        let steps = vec![step(0, true, Some(EvaluationResult::new(Verdict::Fail, 0.9, "bad")))];
        let bugs = extract_bugs(&steps);
        assert_eq!(bugs[0].severity, Severity::Major);
    }

    #[test]
    fn extracts_critical_bug_for_eval_fail_with_page_errors() {
        let mut failing = step(0, true, Some(EvaluationResult::new(Verdict::Fail, 0.9, "bad")));
        failing.capture.page_errors.push(PageError { message: "boom".into() });
        let bugs = extract_bugs(&[failing]);
        assert_eq!(bugs[0].severity, Severity::Critical);
    }
}
