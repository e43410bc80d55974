//! Renders the planner prompt, calls the LLM, and turns its raw output into
//! a validated list of [`Step`]s.

use base64::Engine;
use promptqa_schema::{PageSnapshot, Step, StepKind};

use crate::config::DEFAULT_MAX_STEPS;
use crate::errors::PromptQaError;
use crate::fixup::fixup_raw_steps;
use crate::llm::json_extract::extract_json_array;
use crate::llm::LlmClient;
use crate::prompts::{render, Template};

/// Renders the planner prompt and produces a validated plan.
///
/// `max_steps` bounds the accepted plan length; `screenshot` is an optional
/// (png bytes, mime type) pair supplied to a vision-capable call.
pub async fn plan(
    llm: &dyn LlmClient,
    prompt: &str,
    base_url: &str,
    snapshot: &PageSnapshot,
    max_steps: u32,
    screenshot: Option<(&[u8], &str)>,
) -> Result<Vec<Step>, PromptQaError> {
    let rendered = render_planner_prompt(prompt, base_url, snapshot);

    let raw = call(llm, &rendered, screenshot).await?;
    if let Ok(steps) = try_parse(&raw, max_steps) {
        return Ok(steps);
    }

    let repair_prompt = render(
        Template::PlannerRepair,
        &[("rawOutput", &raw), ("error", "output did not parse as a valid step list")],
    );
    let repaired = call(llm, &repair_prompt, screenshot).await?;
    try_parse(&repaired, max_steps)
        .map_err(|err| PromptQaError::planner(format!("planner repair attempt also failed: {err}")))
}

async fn call(llm: &dyn LlmClient, rendered: &str, screenshot: Option<(&[u8], &str)>) -> Result<String, PromptQaError> {
    const SYSTEM: &str = "You are a deterministic browser-automation planner. Respond with JSON only.";
    match screenshot {
        Some((bytes, mime_type)) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            llm.generate_with_image(SYSTEM, rendered, &encoded, mime_type).await
        }
        None => llm.generate(SYSTEM, rendered).await,
    }
}

fn render_planner_prompt(prompt: &str, base_url: &str, snapshot: &PageSnapshot) -> String {
    let elements = render_elements(snapshot);
    render(
        Template::Planner,
        &[
            ("title", &snapshot.title),
            ("url", &snapshot.url),
            ("metaDescription", snapshot.meta_description.as_deref().unwrap_or("")),
            ("visibleText", &snapshot.visible_text),
            ("elements", &elements),
            ("prompt", prompt),
            ("baseUrl", base_url),
        ],
    )
}

/// Serializes interactive elements as pseudo-HTML tags, carrying state
/// flags (`DISABLED`, `BUSY`, `READONLY`, loading classes) the way the
/// planner prompt expects to see them.
pub(crate) fn render_elements(snapshot: &PageSnapshot) -> String {
    snapshot
        .elements
        .iter()
        .map(|element| {
            let mut attrs = vec![format!("tag=\"{}\"", element.tag)];
            if let Some(r#type) = &element.r#type {
                attrs.push(format!("type=\"{type}\""));
            }
            if let Some(test_id) = &element.test_id {
                attrs.push(format!("data-testid=\"{test_id}\""));
            }
            if let Some(name) = &element.name {
                attrs.push(format!("name=\"{name}\""));
            }
            if let Some(placeholder) = &element.placeholder {
                attrs.push(format!("placeholder=\"{placeholder}\""));
            }
            if let Some(href) = &element.href {
                attrs.push(format!("href=\"{href}\""));
            }
            if let Some(label) = element.label() {
                attrs.push(format!("label=\"{label}\""));
            }
            if element.disabled {
                attrs.push("DISABLED".to_string());
            }
            if element.read_only {
                attrs.push("READONLY".to_string());
            }
            if element.aria_busy {
                attrs.push("BUSY".to_string());
            }
            if let Some(classes) = &element.class_list {
                if classes.iter().any(|class| class.to_ascii_lowercase().contains("load")) {
                    attrs.push("LOADING".to_string());
                }
            }
            format!("<{}>", attrs.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn try_parse(raw: &str, max_steps: u32) -> Result<Vec<Step>, PromptQaError> {
    let extracted = extract_json_array(raw);
    let json: serde_json::Value = serde_json::from_str(&extracted)
        .map_err(|err| PromptQaError::planner(format!("planner output was not valid JSON: {err}")))?;
    let fixed = fixup_raw_steps(json);

    let steps: Vec<Step> = serde_json::from_value(fixed)
        .map_err(|err| PromptQaError::planner(format!("plan did not match step schema: {err}")))?;

    validate_plan(&steps, max_steps)?;
    Ok(steps)
}

fn validate_plan(steps: &[Step], max_steps: u32) -> Result<(), PromptQaError> {
    if steps.is_empty() {
        return Err(PromptQaError::planner("plan must contain at least one step"));
    }
    if steps.len() > max_steps as usize {
        return Err(PromptQaError::planner(format!(
            "plan has {} steps, exceeding the maximum of {max_steps}",
            steps.len()
        )));
    }
    if !matches!(steps[0].kind, StepKind::Goto { .. }) {
        return Err(PromptQaError::planner("the first step of every plan must be goto"));
    }
    for step in steps {
        step.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn snapshot() -> PageSnapshot {
        PageSnapshot::new("http://example.test", "Example", "Welcome")
    }

    #[tokio::test]
    async fn valid_plan_parses_on_first_attempt() {
        let plan_json = serde_json::json!([
            { "type": "goto", "value": "http://example.test", "description": "open" },
            { "type": "expect_text", "value": "Example", "description": "title" },
        ])
        .to_string();
        let llm = MockLlmClient::new(vec![plan_json]);

        let steps = plan(&llm, "visit and check title", "http://example.test", &snapshot(), DEFAULT_MAX_STEPS, None)
            .await
            .unwrap();
        assert_eq!(steps.len(), 2);
    }

    #[tokio::test]
    async fn invalid_then_valid_succeeds_via_repair() {
        let plan_json = serde_json::json!([
            { "type": "goto", "value": "http://example.test", "description": "open" },
        ])
        .to_string();
        let llm = MockLlmClient::new(vec!["not json".to_string(), plan_json]);

        let steps = plan(&llm, "visit", "http://example.test", &snapshot(), DEFAULT_MAX_STEPS, None).await.unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[tokio::test]
    async fn both_attempts_invalid_raises_planner_error() {
        let llm = MockLlmClient::new(vec!["not json".to_string(), "still not json".to_string()]);
        let result = plan(&llm, "visit", "http://example.test", &snapshot(), DEFAULT_MAX_STEPS, None).await;
        assert!(matches!(result, Err(PromptQaError::Planner(_))));
    }

    #[tokio::test]
    async fn plan_not_starting_with_goto_is_rejected_then_repaired() {
        let bad = serde_json::json!([
            { "type": "click", "selector": { "strategy": "css", "value": "#go" }, "description": "click" },
        ])
        .to_string();
        let good = serde_json::json!([
            { "type": "goto", "value": "http://example.test", "description": "open" },
        ])
        .to_string();
        let llm = MockLlmClient::new(vec![bad, good]);
        let steps = plan(&llm, "visit", "http://example.test", &snapshot(), DEFAULT_MAX_STEPS, None).await.unwrap();
        assert_eq!(steps.len(), 1);
    }
}
