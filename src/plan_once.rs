//! The plan-once pipeline: prescan → plan → execute with retry/hard-fail
//! classification → per-step evaluation → deterministic summary.

use std::path::Path;

use chrono::Utc;
use promptqa_driver::{prescan, runner, DriverPage};
use promptqa_schema::{RunSummary, Step, StepExecutionResult, Verdict};
use uuid::Uuid;

use crate::classify::{classify_failure, Classification};
use crate::config::RETRY_WAIT_MS;
use crate::errors::PromptQaError;
use crate::llm::LlmClient;
use crate::summary::{compute_summary_verdict, extract_bugs, planner_failure_bug};
use crate::{evaluator, planner};

/// Runs the full plan-once pipeline and returns the run summary alongside
/// the CLI exit code (which may be 3 on a planner failure, independent of
/// [`crate::report::exit_code_for_verdict`]).
#[allow(clippy::too_many_arguments)]
pub async fn run(
    llm: &dyn LlmClient,
    page: &dyn DriverPage,
    base_url: &str,
    prompt: &str,
    max_steps: u32,
    total_timeout_secs: u64,
    login_prompt: Option<&str>,
    output_dir: Option<&Path>,
) -> Result<(RunSummary, i32), PromptQaError> {
    let screenshot_dir = output_dir.map(|dir| dir.join("screenshots"));
    let screenshot_dir = screenshot_dir.as_deref();
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(total_timeout_secs);

    let mut snapshot = prescan::run(page, base_url).await?;
    let mut screenshot = capture_screenshot(page).await;

    let mut login_failed = false;
    if let Some(login_prompt) = login_prompt {
        if let Err(err) = run_login(llm, page, base_url, login_prompt, screenshot.as_ref().map(|bytes| bytes.as_slice())).await {
            tracing::warn!(error = %err, "login sub-loop failed; continuing without authentication");
            login_failed = true;
        }
        snapshot = prescan::current(page).await?;
        screenshot = capture_screenshot(page).await;
    }

    let steps = match planner::plan(llm, prompt, base_url, &snapshot, max_steps, screenshot.as_ref().map(|bytes| (bytes.as_slice(), "image/png"))).await {
        Ok(steps) => steps,
        Err(err) => return Ok(build_planner_failure_summary(run_id, base_url, prompt, started_at, &err)),
    };
    let steps: Vec<Step> = steps.into_iter().take(max_steps as usize).collect();

    let mut results: Vec<StepExecutionResult> = Vec::new();
    let mut prev_visible_text = snapshot.visible_text.clone();

    for (index, step) in steps.into_iter().enumerate() {
        if tokio::time::Instant::now() > deadline {
            break;
        }

        let mut result = execute_with_crash_guard(page, &step, index, screenshot_dir).await;
        let classification = classify_failure(&result, &prev_visible_text);

        result = match classification {
            Classification::ElementNotFound if tokio::time::Instant::now() + std::time::Duration::from_millis(RETRY_WAIT_MS) < deadline => {
                tokio::time::sleep(std::time::Duration::from_millis(RETRY_WAIT_MS)).await;
                execute_with_crash_guard(page, &step, index, screenshot_dir).await
            }
            Classification::ActionNoEffect => execute_with_crash_guard(page, &step, index, screenshot_dir).await,
            _ => result,
        };

        if tokio::time::Instant::now() <= deadline {
            let evaluation = evaluator::evaluate(llm, &result).await;
            result.evaluation = Some(evaluation);
        }

        persist_step_result(output_dir, index, &result).await;

        // Re-classifies after evaluation using the same prevVisibleText the
        // first classification saw, *before* it is updated for the next
        // iteration — evaluation can surface a hard fail the deterministic
        // classifier alone couldn't see from capture data.
        let reclassified = classify_failure(&result, &prev_visible_text);
        prev_visible_text = result.visible_text.clone();
        results.push(result);

        if reclassified == Classification::HardFail {
            break;
        }
    }

    let finished_at = Utc::now();
    let duration_ms = (finished_at - started_at).num_milliseconds();
    let summary_verdict = compute_summary_verdict(&results);
    let bugs = extract_bugs(&results);

    let run_summary = RunSummary {
        run_id,
        url: base_url.to_string(),
        prompt: prompt.to_string(),
        summary: summary_verdict,
        started_at,
        finished_at,
        duration_ms,
        steps: results,
        bugs,
        login_failed,
    };

    let exit_code = crate::report::exit_code_for_verdict(run_summary.summary);
    Ok((run_summary, exit_code))
}

/// Executes `step`, synthesizing a failed result with a page-error message
/// if the runner itself returns an error (a "step execution crash").
pub(crate) async fn execute_with_crash_guard(page: &dyn DriverPage, step: &Step, index: usize, screenshot_dir: Option<&Path>) -> StepExecutionResult {
    match runner::execute_step(page, step, index, screenshot_dir).await {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(step = index, error = %err, "step execution crashed");
            let mut capture = promptqa_schema::CaptureFrame::default();
            capture.page_errors.push(promptqa_schema::PageError { message: err.to_string() });
            StepExecutionResult {
                step_index: index,
                step: step.clone(),
                success: false,
                url: String::new(),
                screenshot_path: None,
                visible_text: String::new(),
                capture,
                evaluation: None,
            }
        }
    }
}

pub(crate) async fn run_login(
    llm: &dyn LlmClient,
    page: &dyn DriverPage,
    base_url: &str,
    login_prompt: &str,
    screenshot: Option<&[u8]>,
) -> Result<(), PromptQaError> {
    let snapshot = prescan::current(page).await?;
    let steps = planner::plan(llm, login_prompt, base_url, &snapshot, crate::config::LOGIN_MAX_STEPS, screenshot.map(|bytes| (bytes, "image/png"))).await?;

    for (index, step) in steps.into_iter().enumerate() {
        let result = execute_with_crash_guard(page, &step, index, None).await;
        if !result.success {
            return Err(PromptQaError::Driver(promptqa_driver::DriverError::ActionNoEffect {
                description: format!("login step {index} failed"),
            }));
        }
    }

    page.wait_for(None, crate::config::LOGIN_NETWORK_IDLE_WAIT_MS).await?;
    Ok(())
}

pub(crate) async fn capture_screenshot(page: &dyn DriverPage) -> Option<Vec<u8>> {
    page.screenshot_png().await.ok()
}

pub(crate) async fn persist_step_result(output_dir: Option<&Path>, index: usize, result: &StepExecutionResult) {
    let Some(dir) = output_dir else { return };
    let path = dir.join(format!("step-{index}.json"));
    let json = match serde_json::to_vec_pretty(result) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(step = index, error = %err, "failed to serialize step result");
            return;
        }
    };
    if let Err(err) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!(step = index, error = %err, "failed to create report directory");
        return;
    }
    if let Err(err) = tokio::fs::write(&path, json).await {
        tracing::warn!(step = index, error = %err, "failed to persist step result");
    }
}

fn build_planner_failure_summary(
    run_id: Uuid,
    base_url: &str,
    prompt: &str,
    started_at: chrono::DateTime<Utc>,
    err: &PromptQaError,
) -> (RunSummary, i32) {
    let finished_at = Utc::now();
    let duration_ms = (finished_at - started_at).num_milliseconds();
    let run_summary = RunSummary {
        run_id,
        url: base_url.to_string(),
        prompt: prompt.to_string(),
        summary: Verdict::Fail,
        started_at,
        finished_at,
        duration_ms,
        steps: Vec::new(),
        bugs: vec![planner_failure_bug(&err.to_string())],
        login_failed: false,
    };
    (run_summary, 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptqa_driver::fake::{css_hint, FakeDriver, FakePage};
    use promptqa_schema::Verdict;

    fn plan_response(steps_json: serde_json::Value) -> String {
        steps_json.to_string()
    }

    #[tokio::test]
    async fn happy_path_produces_pass_and_exit_code_zero() {
        let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "Example Domain"));
        let plan = plan_response(serde_json::json!([
            { "type": "goto", "value": "http://example.test", "description": "open" },
            { "type": "expect_text", "value": "Example", "description": "title" },
        ]));
        let llm = crate::llm::MockLlmClient::new(vec![
            plan,
            serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
            serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
        ]);

        let (summary, exit_code) = run(&llm, &driver, "http://example.test", "visit and check title", 12, 30, None, None).await.unwrap();
        assert_eq!(summary.summary, Verdict::Pass);
        assert_eq!(exit_code, 0);
        assert_eq!(summary.steps.len(), 2);
    }

    #[tokio::test]
    async fn planner_hard_failure_yields_exit_code_three() {
        let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "Example Domain"));
        let llm = crate::llm::MockLlmClient::new(vec!["not json".to_string(), "still not json".to_string()]);

        let (summary, exit_code) = run(&llm, &driver, "http://example.test", "visit", 12, 30, None, None).await.unwrap();
        assert_eq!(exit_code, 3);
        assert_eq!(summary.summary, Verdict::Fail);
        assert!(summary.bugs[0].description.starts_with("Planner error"));
    }

    #[tokio::test]
    async fn hard_fail_mid_run_stops_loop() {
        let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "Example Domain"));
        // Step index 2's click succeeds but leaves an uncaught-exception
        // page error behind, which the classifier turns into a hard fail.
        driver.queue_page_error_on_action("#go2", "Uncaught TypeError");
        let _ = css_hint("#go2");

        let plan = plan_response(serde_json::json!([
            { "type": "goto", "value": "http://example.test", "description": "open" },
            { "type": "click", "selector": { "strategy": "css", "value": "#go" }, "description": "click go" },
            { "type": "click", "selector": { "strategy": "css", "value": "#go2" }, "description": "click go2" },
            { "type": "click", "selector": { "strategy": "css", "value": "#go3" }, "description": "click go3" },
        ]));
        let llm = crate::llm::MockLlmClient::new(vec![
            plan,
            serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
            serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
        ]);

        let (summary, exit_code) = run(&llm, &driver, "http://example.test", "visit", 12, 30, None, None).await.unwrap();
        assert_eq!(summary.summary, Verdict::Fail);
        assert_eq!(exit_code, 1);
        // The loop stops after the hard-failing step (index 2); the fourth
        // planned step never executes.
        assert_eq!(summary.steps.len(), 3);
        assert!(summary.bugs.iter().any(|bug| bug.severity == promptqa_schema::Severity::Critical));
    }
}
