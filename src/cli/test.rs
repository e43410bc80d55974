use clap::{Args, ValueEnum};

use super::env::CommonOverrides;
use super::runtime::{apply_overrides, resolve_config};
use crate::errors::PromptQaError;

/// Which engine drives the run. Not named in the original interface
/// description; exposed here as the minimal surface needed to reach both
/// loop engines from the CLI.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    #[value(name = "plan-once")]
    PlanOnce,
    #[value(name = "agent")]
    Agent,
}

#[derive(Args)]
pub struct TestArgs {
    /// URL to open before running the prompt.
    pub url: String,

    /// Natural-language goal the loop should achieve.
    pub prompt: String,

    /// Execution engine: a one-shot plan, or a closed observe-decide-act loop.
    #[arg(long, value_enum, default_value_t = Strategy::PlanOnce)]
    pub strategy: Strategy,

    #[command(flatten)]
    pub overrides: CommonOverrides,
}

pub async fn cmd_test(args: TestArgs, config_path: &std::path::Path) -> Result<(i32, serde_json::Value, String), PromptQaError> {
    let mut config = resolve_config(config_path, &args.url, &args.prompt)?;
    apply_overrides(&mut config, &args.overrides);
    config.validate()?;

    let test = crate::config::TestCase { name: "test".to_string(), prompt: args.prompt.clone(), url: Some(args.url.clone()) };
    super::runtime::run_one(&config, &test, args.strategy, &args.overrides.report_path).await
}
