//! Prompt templates, treated as opaque assets with `{{placeholder}}`
//! substitution. Embedded at compile time from `prompts/` (relative to this
//! crate's manifest, i.e. the binary's own source tree) so the shipped
//! binary never depends on a writable filesystem layout at runtime.

const PLANNER: &str = include_str!("../prompts/planner.md");
const PLANNER_REPAIR: &str = include_str!("../prompts/planner_repair.md");
const EVALUATOR: &str = include_str!("../prompts/evaluator.md");
const AGENT_STEP: &str = include_str!("../prompts/agent_step.md");
const AGENT_FINAL: &str = include_str!("../prompts/agent_final.md");

/// Which opaque template asset to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Planner,
    PlannerRepair,
    Evaluator,
    AgentStep,
    AgentFinal,
}

impl Template {
    fn source(self) -> &'static str {
        match self {
            Template::Planner => PLANNER,
            Template::PlannerRepair => PLANNER_REPAIR,
            Template::Evaluator => EVALUATOR,
            Template::AgentStep => AGENT_STEP,
            Template::AgentFinal => AGENT_FINAL,
        }
    }
}

/// Substitutes every `{{key}}` placeholder with its value from `vars`.
/// Placeholders with no matching entry are left untouched, matching the
/// reference renderer's "missing key is a no-op" behavior.
pub fn render(template: Template, vars: &[(&str, &str)]) -> String {
    let mut text = template.source().to_string();
    for (key, value) in vars {
        text = text.replace(&format!("{{{{{key}}}}}"), value);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders() {
        let rendered = render(Template::Evaluator, &[("description", "click submit")]);
        assert!(rendered.contains("click submit"));
        assert!(!rendered.contains("{{description}}"));
    }

    #[test]
    fn leaves_unknown_placeholders_untouched() {
        let rendered = render(Template::Planner, &[]);
        assert!(rendered.contains("{{url}}"));
    }
}
