//! Pre-validation repair: best-effort normalization of a raw, untyped LLM
//! response before it is narrowed into [`promptqa_schema::Step`]s.
//!
//! This operates on [`serde_json::Value`] deliberately — the planner and
//! agent-step response both need to coerce near-miss JSON (missing
//! description, a selector strategy the LLM invented) into shapes the typed
//! schema will accept, and that coercion has to happen before `serde`
//! attempts to deserialize into the tagged union.

use serde_json::{json, Map, Value};

const KNOWN_STRATEGIES: &[&str] = &["testid", "role", "text", "css"];

/// Applies [`fixup_step`] to every element of a raw step-list array.
/// Non-array input is returned unchanged — the caller's schema validation
/// will reject it with a clearer error than anything fixed up here.
pub fn fixup_raw_steps(value: Value) -> Value {
    match value {
        Value::Array(steps) => Value::Array(steps.into_iter().map(fixup_step).collect()),
        other => other,
    }
}

/// Repairs a single raw step object in place:
/// - supplies a default `description` (`"{type} step"`) when missing or blank
/// - rewrites an unrecognized selector `strategy` into a valid one
/// - synthesizes a missing `expect_text` value from a quoted substring in
///   the description, or a truncated fallback
pub fn fixup_step(value: Value) -> Value {
    let Value::Object(mut step) = value else {
        return value;
    };

    let type_name = step.get("type").and_then(Value::as_str).unwrap_or("").to_string();

    ensure_description(&mut step, &type_name);
    fixup_selector_field(&mut step, "selector");

    if type_name == "expect_text" {
        ensure_expect_text_value(&mut step);
    }

    Value::Object(step)
}

fn ensure_description(step: &mut Map<String, Value>, type_name: &str) {
    let needs_default = match step.get("description") {
        Some(Value::String(text)) => text.trim().is_empty(),
        _ => true,
    };
    if needs_default {
        let fallback = if type_name.is_empty() { "step".to_string() } else { format!("{type_name} step") };
        step.insert("description".to_string(), Value::String(fallback));
    }
}

fn fixup_selector_field(step: &mut Map<String, Value>, field: &str) {
    let Some(Value::Object(selector)) = step.get_mut(field) else { return };

    let strategy = selector.get("strategy").and_then(Value::as_str).unwrap_or("").to_string();
    if KNOWN_STRATEGIES.contains(&strategy.as_str()) {
        return;
    }

    let value = selector.get("value").and_then(Value::as_str).unwrap_or("").to_string();
    let (new_strategy, new_value) = rewrite_strategy(&strategy, &value, selector);

    selector.clear();
    selector.insert("strategy".to_string(), json!(new_strategy));
    selector.insert("value".to_string(), json!(new_value));
}

/// Maps an LLM-invented selector strategy onto one of the four the schema
/// accepts, per the planner's pre-validation repair rules.
fn rewrite_strategy(strategy: &str, value: &str, selector: &Map<String, Value>) -> (&'static str, String) {
    match strategy {
        "placeholder" => ("css", format!("input[placeholder='{}']", escape_attr(value))),
        "name" => ("css", format!("[name='{}']", escape_attr(value))),
        "id" => ("css", format!("#{value}")),
        "label" => ("text", value.to_string()),
        _ => {
            // Generic attribute selector: best-effort guess using whatever
            // attribute-like field the LLM supplied alongside `value`.
            let attr = selector
                .keys()
                .find(|key| key.as_str() != "strategy" && key.as_str() != "value")
                .cloned()
                .unwrap_or_else(|| "data-testid".to_string());
            ("css", format!("[{attr}='{}']", escape_attr(value)))
        }
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\'', "\\'")
}

fn ensure_expect_text_value(step: &mut Map<String, Value>) {
    let has_value = matches!(step.get("value"), Some(Value::String(text)) if !text.trim().is_empty());
    if has_value {
        return;
    }

    let description = step.get("description").and_then(Value::as_str).unwrap_or("");
    let synthesized = quoted_substring(description).unwrap_or_else(|| truncate(description, 50));
    step.insert("value".to_string(), Value::String(synthesized));
}

/// Extracts the first `'...'` or `"..."` quoted substring from `text`.
fn quoted_substring(text: &str) -> Option<String> {
    for quote in ['"', '\''] {
        if let Some(start) = text.find(quote) {
            if let Some(end) = text[start + 1..].find(quote) {
                let candidate = &text[start + 1..start + 1 + end];
                if !candidate.trim().is_empty() {
                    return Some(candidate.to_string());
                }
            }
        }
    }
    None
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        trimmed.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplies_default_description() {
        let fixed = fixup_step(json!({ "type": "click", "selector": { "strategy": "css", "value": "#go" } }));
        assert_eq!(fixed["description"], "click step");
    }

    #[test]
    fn rewrites_placeholder_strategy_to_css() {
        let fixed = fixup_step(json!({
            "type": "type",
            "description": "fill email",
            "selector": { "strategy": "placeholder", "value": "Email address" },
        }));
        assert_eq!(fixed["selector"]["strategy"], "css");
        assert_eq!(fixed["selector"]["value"], "input[placeholder='Email address']");
    }

    #[test]
    fn rewrites_id_strategy() {
        let fixed = fixup_step(json!({
            "type": "click",
            "description": "click",
            "selector": { "strategy": "id", "value": "submit-button" },
        }));
        assert_eq!(fixed["selector"]["value"], "#submit-button");
    }

    #[test]
    fn leaves_known_strategies_untouched() {
        let fixed = fixup_step(json!({
            "type": "click",
            "description": "click",
            "selector": { "strategy": "testid", "value": "go" },
        }));
        assert_eq!(fixed["selector"]["strategy"], "testid");
    }

    #[test]
    fn synthesizes_expect_text_value_from_quoted_substring() {
        let fixed = fixup_step(json!({
            "type": "expect_text",
            "description": "the page should show 'Order confirmed'",
        }));
        assert_eq!(fixed["value"], "Order confirmed");
    }

    #[test]
    fn synthesizes_expect_text_value_fallback_when_no_quotes() {
        let fixed = fixup_step(json!({
            "type": "expect_text",
            "description": "the page should show a confirmation banner without quotes here",
        }));
        assert_eq!(fixed["value"], "the page should show a confirmation banner without");
    }

    #[test]
    fn idempotent_on_already_valid_step() {
        let step = json!({
            "type": "goto",
            "value": "http://example.test",
            "description": "open",
        });
        assert_eq!(fixup_step(step.clone()), step);
    }
}
