//! The stable JSON/markdown report contract. `summary.json`'s shape is
//! frozen by `version: "1.0"`; every field name here is part of that
//! public contract and must not change without a version bump.

use promptqa_schema::{RunSummary, Verdict};
use serde_json::{json, Map, Value};

pub const REPORT_VERSION: &str = "1.0";

/// Maps a final verdict to its CLI exit code. Planner-stage and
/// config/unexpected-error exit codes (3, 4) never
/// flow through here — see [`crate::errors::PromptQaError::exit_code`].
pub fn exit_code_for_verdict(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Pass => 0,
        Verdict::Fail => 1,
        Verdict::Uncertain => 2,
    }
}

/// Builds the `summary.json` record for `run`, with the caller-supplied
/// exit code (which may diverge from `exit_code_for_verdict(run.summary)`
/// on a planner failure).
pub fn generate_json(run: &RunSummary, exit_code: i32) -> Value {
    json!({
        "version": REPORT_VERSION,
        "summary": run.summary.as_str(),
        "runId": run.run_id,
        "url": run.url,
        "prompt": run.prompt,
        "durationMs": run.duration_ms,
        "exitCode": exit_code,
        "steps": run.steps.iter().map(step_record).collect::<Vec<_>>(),
        "bugs": run.bugs.iter().map(bug_record).collect::<Vec<_>>(),
    })
}

fn step_record(step: &promptqa_schema::StepExecutionResult) -> Value {
    let errors = step
        .capture
        .page_errors
        .iter()
        .map(|error| error.message.clone())
        .chain(step.capture.network_failures.iter().map(|failure| format!("{} {} -> {}", failure.method, failure.url, failure.status)))
        .collect::<Vec<_>>();

    json!({
        "index": step.step_index,
        "type": step.step.type_name(),
        "description": step.step.description,
        "result": step.evaluation.as_ref().map(|evaluation| evaluation.result.as_str()),
        "confidence": step.evaluation.as_ref().map(|evaluation| evaluation.confidence),
        "reason": step.evaluation.as_ref().map(|evaluation| evaluation.reason.clone()),
        "screenshotPath": step.screenshot_path,
        "errors": errors,
    })
}

fn bug_record(bug: &promptqa_schema::BugReport) -> Value {
    json!({
        "stepIndex": bug.step_index,
        "description": bug.description,
        "severity": bug.severity.as_str(),
        "evidence": bug.evidence,
    })
}

/// Serializes `value` with keys sorted lexicographically at every object
/// level and two-space indentation, so output is byte-identical for equal
/// inputs regardless of the order fields were inserted in.
pub fn serialize_json(value: &Value) -> String {
    let sorted = sort_keys(value);
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    if serde::Serialize::serialize(&sorted, &mut serializer).is_err() {
        return sorted.to_string();
    }
    String::from_utf8(buffer).unwrap_or_else(|_| sorted.to_string())
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Renders the human-readable `report.md` for `run`.
pub fn generate_markdown(run: &RunSummary, exit_code: i32) -> String {
    let mut out = String::new();

    out.push_str("# PromptQA Report\n\n");
    out.push_str("| Field | Value |\n|---|---|\n");
    out.push_str(&format!("| Run ID | {} |\n", run.run_id));
    out.push_str(&format!("| URL | {} |\n", escape_cell(&run.url)));
    out.push_str(&format!("| Prompt | {} |\n", escape_cell(&run.prompt)));
    out.push_str(&format!("| Verdict | {} |\n", run.summary.as_str()));
    out.push_str(&format!("| Exit code | {exit_code} |\n"));
    out.push_str(&format!("| Started | {} |\n", run.started_at.to_rfc3339()));
    out.push_str(&format!("| Finished | {} |\n", run.finished_at.to_rfc3339()));
    out.push_str(&format!("| Duration (ms) | {} |\n", run.duration_ms));
    if run.login_failed {
        out.push_str("| Login | failed |\n");
    }
    out.push('\n');

    out.push_str("## Steps\n\n");
    out.push_str("| # | Type | Description | Result | Confidence | Reason |\n|---|---|---|---|---|---|\n");
    for step in &run.steps {
        let (result, confidence, reason) = match &step.evaluation {
            Some(evaluation) => (evaluation.result.as_str().to_string(), format!("{:.2}", evaluation.confidence), evaluation.reason.clone()),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            step.step_index,
            step.step.type_name(),
            escape_cell(&step.step.description),
            if step.success { result } else { "FAILED".to_string() },
            confidence,
            escape_cell(&reason),
        ));
    }
    out.push('\n');

    out.push_str("## Step Details\n\n");
    for step in &run.steps {
        out.push_str(&format!("### Step {}: {}\n\n", step.step_index, step.step.description));
        out.push_str(&format!("- URL: {}\n", step.url));
        out.push_str(&format!("- Success: {}\n", step.success));
        if let Some(path) = &step.screenshot_path {
            out.push_str(&format!("- Screenshot: {path}\n"));
        }
        if !step.capture.page_errors.is_empty() {
            out.push_str("- Page errors:\n");
            for error in &step.capture.page_errors {
                out.push_str(&format!("  - {}\n", error.message));
            }
        }
        if !step.capture.network_failures.is_empty() {
            out.push_str("- Network failures:\n");
            for failure in &step.capture.network_failures {
                out.push_str(&format!("  - {} {} -> {}\n", failure.method, failure.url, failure.status));
            }
        }
        out.push('\n');
    }

    if !run.bugs.is_empty() {
        out.push_str("## Bug Reports\n\n");
        out.push_str("| Step | Severity | Description |\n|---|---|---|\n");
        for bug in &run.bugs {
            out.push_str(&format!("| {} | {} | {} |\n", bug.step_index, bug.severity.as_str(), escape_cell(&bug.description)));
        }
        out.push('\n');
    }

    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_mapping_matches_spec() {
        assert_eq!(exit_code_for_verdict(Verdict::Pass), 0);
        assert_eq!(exit_code_for_verdict(Verdict::Fail), 1);
        assert_eq!(exit_code_for_verdict(Verdict::Uncertain), 2);
    }

    #[test]
    fn serialize_json_sorts_keys_at_every_level() {
        let value = json!({ "b": 1, "a": { "z": 1, "y": 2 } });
        let serialized = serialize_json(&value);
        let a_pos = serialized.find("\"a\"").unwrap();
        let b_pos = serialized.find("\"b\"").unwrap();
        assert!(a_pos < b_pos);
        let y_pos = serialized.find("\"y\"").unwrap();
        let z_pos = serialized.find("\"z\"").unwrap();
        assert!(y_pos < z_pos);
    }

    #[test]
    fn serialize_json_is_deterministic_for_equal_input() {
        let value = json!({ "b": 1, "a": 2 });
        assert_eq!(serialize_json(&value), serialize_json(&value));
    }

    #[test]
    fn escape_cell_handles_pipes_and_newlines() {
        assert_eq!(escape_cell("a | b\nc"), "a \\| b c");
    }
}
