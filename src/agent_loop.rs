//! The closed-loop agent: observe → decide → act for up to `V2_MAX_STEPS`
//! iterations, followed by a mandatory final evaluation regardless of
//! whether the agent declared itself done.

use std::path::Path;

use base64::Engine;
use chrono::Utc;
use promptqa_driver::{prescan, DriverPage};
use promptqa_schema::{
    ActionHistoryEntry, AgentFinalEvaluation, AgentStepResponse, EvaluationResult, PageSnapshot,
    RunSummary, StepExecutionResult,
};
use uuid::Uuid;

use crate::config::V2_MAX_STEPS;
use crate::errors::PromptQaError;
use crate::fixup::fixup_step;
use crate::llm::json_extract::extract_json_object;
use crate::llm::LlmClient;
use crate::plan_once::{capture_screenshot, execute_with_crash_guard, persist_step_result, run_login};
use crate::planner::render_elements;
use crate::prompts::{render, Template};
use crate::summary::{compute_summary_verdict, extract_bugs};

const SYSTEM_STEP: &str = "You are a deterministic browser-automation agent. Respond with JSON only.";
const SYSTEM_FINAL: &str = "You are a strict QA evaluator. Respond with a single JSON object only.";

/// Runs the closed-loop agent and returns the run summary alongside the CLI
/// exit code.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    llm: &dyn LlmClient,
    page: &dyn DriverPage,
    base_url: &str,
    prompt: &str,
    total_timeout_secs: u64,
    login_prompt: Option<&str>,
    output_dir: Option<&Path>,
) -> Result<(RunSummary, i32), PromptQaError> {
    let screenshot_dir = output_dir.map(|dir| dir.join("screenshots"));
    let screenshot_dir = screenshot_dir.as_deref();
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(total_timeout_secs);

    prescan::run(page, base_url).await?;

    let mut login_failed = false;
    if let Some(login_prompt) = login_prompt {
        let screenshot = capture_screenshot(page).await;
        if let Err(err) = run_login(llm, page, base_url, login_prompt, screenshot.as_deref()).await {
            tracing::warn!(error = %err, "login sub-loop failed; continuing without authentication");
            login_failed = true;
        }
    }

    let mut results: Vec<StepExecutionResult> = Vec::new();
    let mut history: Vec<ActionHistoryEntry> = Vec::new();
    let mut agent_summary = String::new();
    let mut declared_done = false;

    for _ in 0..V2_MAX_STEPS {
        if tokio::time::Instant::now() > deadline {
            break;
        }

        let snapshot = prescan::current(page).await?;
        let screenshot = capture_screenshot(page).await;

        let decision = decide(llm, prompt, &snapshot, &history, screenshot.as_deref()).await;
        let decision = match decision {
            Some(decision) => decision,
            None => {
                history.push(ActionHistoryEntry {
                    step_index: history.len(),
                    action: "decide".to_string(),
                    description: "agent response did not parse".to_string(),
                    success: false,
                    observation: truncate_history(&snapshot.visible_text),
                });
                continue;
            }
        };

        match decision {
            AgentStepResponse::Done { summary, .. } => {
                agent_summary = summary;
                declared_done = true;
                break;
            }
            AgentStepResponse::Act { action, .. } => {
                let index = results.len();
                let result = execute_with_crash_guard(page, &action, index, screenshot_dir).await;
                persist_step_result(output_dir, index, &result).await;

                history.push(ActionHistoryEntry {
                    step_index: index,
                    action: action.type_name().to_string(),
                    description: action.description.clone(),
                    success: result.success,
                    observation: truncate_history(&result.visible_text),
                });

                results.push(result);
            }
        }
    }

    let final_snapshot = prescan::current(page).await.ok();
    let final_screenshot = capture_screenshot(page).await;
    let final_evaluation = evaluate_final(llm, prompt, final_snapshot.as_ref(), &agent_summary, final_screenshot.as_deref()).await;

    if let Some(final_evaluation) = &final_evaluation {
        if let Some(last) = results.last_mut() {
            last.evaluation = Some(EvaluationResult::new(
                final_evaluation.result,
                final_evaluation.confidence,
                final_evaluation.reason.clone(),
            ));
        }
    }

    let finished_at = Utc::now();
    let duration_ms = (finished_at - started_at).num_milliseconds();

    let summary_verdict = if results.is_empty() && declared_done {
        match &final_evaluation {
            Some(final_evaluation) => final_evaluation.result,
            None => compute_summary_verdict(&results),
        }
    } else {
        compute_summary_verdict(&results)
    };

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

async fn call(llm: &dyn LlmClient, system: &str, rendered: &str, screenshot: Option<&[u8]>) -> Result<String, PromptQaError> {
    match screenshot {
        Some(bytes) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            llm.generate_with_image(system, rendered, &encoded, "image/png").await
        }
        None => llm.generate(system, rendered).await,
    }
}

async fn decide(
    llm: &dyn LlmClient,
    goal: &str,
    snapshot: &PageSnapshot,
    history: &[ActionHistoryEntry],
    screenshot: Option<&[u8]>,
) -> Option<AgentStepResponse> {
    let rendered = render_agent_step_prompt(goal, snapshot, history);
    let raw = call(llm, SYSTEM_STEP, &rendered, screenshot).await.ok()?;
    try_parse_step(&raw)
}

fn render_agent_step_prompt(goal: &str, snapshot: &PageSnapshot, history: &[ActionHistoryEntry]) -> String {
    let elements = render_elements(snapshot);
    render(
        Template::AgentStep,
        &[
            ("goal", goal),
            ("url", &snapshot.url),
            ("title", &snapshot.title),
            ("visibleText", &snapshot.visible_text),
            ("elements", &elements),
            ("history", &format_history(history)),
        ],
    )
}

fn format_history(history: &[ActionHistoryEntry]) -> String {
    if history.is_empty() {
        return "(none yet)".to_string();
    }
    history
        .iter()
        .map(|entry| {
            format!(
                "{}. {} — {} [{}] observed: {}",
                entry.step_index,
                entry.action,
                entry.description,
                if entry.success { "ok" } else { "failed" },
                entry.observation,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses one `agent_step` response, applying the same selector/description
/// repair the planner uses before narrowing into the typed union.
fn try_parse_step(raw: &str) -> Option<AgentStepResponse> {
    let extracted = extract_json_object(raw);
    let mut value: serde_json::Value = serde_json::from_str(&extracted).ok()?;
    if let serde_json::Value::Object(ref mut map) = value {
        if let Some(action) = map.remove("action") {
            map.insert("action".to_string(), fixup_step(action));
        }
    }
    let response: AgentStepResponse = serde_json::from_value(value).ok()?;
    response.validate().ok()?;
    Some(response)
}

async fn evaluate_final(
    llm: &dyn LlmClient,
    goal: &str,
    snapshot: Option<&PageSnapshot>,
    agent_summary: &str,
    screenshot: Option<&[u8]>,
) -> Option<AgentFinalEvaluation> {
    let (url, visible_text) = match snapshot {
        Some(snapshot) => (snapshot.url.clone(), snapshot.visible_text.clone()),
        None => (String::new(), String::new()),
    };
    let rendered = render(
        Template::AgentFinal,
        &[("goal", goal), ("url", &url), ("visibleText", &visible_text), ("agentSummary", agent_summary)],
    );
    let raw = call(llm, SYSTEM_FINAL, &rendered, screenshot).await.ok()?;
    try_parse_final(&raw)
}

fn try_parse_final(raw: &str) -> Option<AgentFinalEvaluation> {
    let extracted = extract_json_object(raw);
    let parsed: AgentFinalEvaluation = serde_json::from_str(&extracted).ok()?;
    let clamped = AgentFinalEvaluation { confidence: parsed.confidence.clamp(0.0, 1.0), ..parsed };
    clamped.validate().ok()?;
    Some(clamped)
}

/// Truncates an observation string to roughly 80 characters for the agent
/// loop's action history, distinct from the longer `truncate_observation`
/// used elsewhere.
fn truncate_history(raw: &str) -> String {
    const MAX: usize = 80;
    if raw.chars().count() <= MAX {
        raw.to_string()
    } else {
        let mut truncated: String = raw.chars().take(MAX).collect();
        truncated.push('\u{2026}');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptqa_driver::fake::{FakeDriver, FakePage};
    use promptqa_schema::Verdict;

    #[tokio::test]
    async fn done_on_first_decision_runs_final_evaluation() {
        let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "Example Domain"));
        let decide_response = serde_json::json!({ "done": true, "summary": "Confirmed the heading is present." }).to_string();
        let final_response = serde_json::json!({ "result": "PASS", "confidence": 0.95, "reason": "heading visible" }).to_string();
        let llm = crate::llm::MockLlmClient::new(vec![decide_response, final_response]);

        let (summary, exit_code) = run(&llm, &driver, "http://example.test", "confirm the heading", 30, None, None).await.unwrap();
        assert_eq!(summary.summary, Verdict::Pass);
        assert_eq!(exit_code, 0);
        assert!(summary.steps.is_empty());
    }

    #[tokio::test]
    async fn act_then_done_overwrites_last_step_evaluation() {
        let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "Example Domain"));
        let act_response = serde_json::json!({
            "done": false,
            "action": { "type": "click", "selector": { "strategy": "css", "value": "#go" }, "description": "click go" },
        })
        .to_string();
        let done_response = serde_json::json!({ "done": true, "summary": "Clicked go." }).to_string();
        let final_response = serde_json::json!({ "result": "PASS", "confidence": 0.8, "reason": "looks right" }).to_string();
        let llm = crate::llm::MockLlmClient::new(vec![act_response, done_response, final_response]);

        let (summary, exit_code) = run(&llm, &driver, "http://example.test", "click go", 30, None, None).await.unwrap();
        assert_eq!(summary.summary, Verdict::Pass);
        assert_eq!(exit_code, 0);
        assert_eq!(summary.steps.len(), 1);
        assert_eq!(summary.steps[0].evaluation.as_ref().unwrap().result, Verdict::Pass);
    }

    #[tokio::test]
    async fn unparseable_decision_is_skipped_not_fatal() {
        let driver = FakeDriver::new(FakePage::new("http://example.test", "Example", "Example Domain"));
        let done_response = serde_json::json!({ "done": true, "summary": "Recovered." }).to_string();
        let final_response = serde_json::json!({ "result": "UNCERTAIN", "confidence": 0.4, "reason": "ambiguous" }).to_string();
        let llm = crate::llm::MockLlmClient::new(vec!["not json at all".to_string(), done_response, final_response]);

        let (summary, exit_code) = run(&llm, &driver, "http://example.test", "do something", 30, None, None).await.unwrap();
        assert_eq!(summary.summary, Verdict::Uncertain);
        assert_eq!(exit_code, 2);
    }
}
