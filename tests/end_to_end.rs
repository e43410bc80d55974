//! End-to-end scenarios driving the plan-once pipeline against a mock LLM
//! and a fake driver.

use promptqa::llm::MockLlmClient;
use promptqa_driver::fake::{FakeDriver, FakePage};
use promptqa_schema::Verdict;

fn plan(steps: serde_json::Value) -> String {
    steps.to_string()
}

#[tokio::test]
async fn action_no_effect_retries_exactly_once() {
    // The page's visible text never changes across clicks, so the first
    // click is classified action_no_effect and retried once; a second
    // click on the same selector is then classified none and the run
    // proceeds without a further retry.
    let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "Same text forever"));
    let llm = MockLlmClient::new(vec![
        plan(serde_json::json!([
            { "type": "goto", "value": "http://example.test", "description": "open" },
            { "type": "click", "selector": { "strategy": "css", "value": "#go" }, "description": "click go" },
        ])),
        serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
        serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
    ]);

    let (summary, exit_code) =
        promptqa::plan_once::run(&llm, &driver, "http://example.test", "click go", 12, 30, None, None)
            .await
            .unwrap();

    assert_eq!(exit_code, 0);
    assert_eq!(summary.summary, Verdict::Pass);
    // One retry: the click selector was resolved twice, but only one
    // StepExecutionResult was recorded for that step index.
    assert_eq!(driver.action_count("#go"), 2);
    assert_eq!(summary.steps.len(), 2);
}

#[tokio::test]
async fn verdict_is_uncertain_when_any_step_evaluates_uncertain() {
    let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "start"));
    let llm = MockLlmClient::new(vec![
        plan(serde_json::json!([
            { "type": "goto", "value": "http://example.test", "description": "open" },
            { "type": "expect_text", "value": "start", "description": "check 1" },
            { "type": "expect_text", "value": "start", "description": "check 2" },
        ])),
        serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
        serde_json::json!({ "result": "UNCERTAIN", "confidence": 0.5, "reason": "unclear" }).to_string(),
        serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
    ]);

    let (summary, exit_code) =
        promptqa::plan_once::run(&llm, &driver, "http://example.test", "check twice", 12, 30, None, None)
            .await
            .unwrap();

    assert_eq!(summary.summary, Verdict::Uncertain);
    assert_eq!(exit_code, 2);
}

#[tokio::test]
async fn element_not_found_is_retried_after_wait() {
    // First resolution of #missing fails; the retry after RETRY_WAIT_MS
    // succeeds because fail_next_selector only fails the very next attempt.
    let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "start"));
    driver.fail_next_selector("#missing");
    let llm = MockLlmClient::new(vec![
        plan(serde_json::json!([
            { "type": "goto", "value": "http://example.test", "description": "open" },
            { "type": "click", "selector": { "strategy": "css", "value": "#missing" }, "description": "click missing" },
        ])),
        serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
        serde_json::json!({ "result": "PASS", "confidence": 0.9, "reason": "ok" }).to_string(),
    ]);

    let (summary, exit_code) =
        promptqa::plan_once::run(&llm, &driver, "http://example.test", "click missing", 12, 30, None, None)
            .await
            .unwrap();

    assert_eq!(exit_code, 0);
    assert_eq!(summary.summary, Verdict::Pass);
    assert!(summary.steps[1].success);
    assert_eq!(driver.action_count("#missing"), 2);
}
