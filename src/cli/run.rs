use clap::Args;

use super::env::CommonOverrides;
use super::runtime::apply_overrides;
use super::test::Strategy;
use crate::config::Config;
use crate::errors::PromptQaError;

#[derive(Args)]
pub struct RunArgs {
    /// Run only the named test instead of every test in the config.
    #[arg(long)]
    pub test: Option<String>,

    /// Execution engine: a one-shot plan, or a closed observe-decide-act loop.
    #[arg(long, value_enum, default_value_t = Strategy::PlanOnce)]
    pub strategy: Strategy,

    #[command(flatten)]
    pub overrides: CommonOverrides,
}

/// Runs every test named in the config (or just `args.test`), partitioning
/// `outputDir` per test, and returns the worst (numerically highest) exit
/// code seen across the batch alongside each test's JSON summary.
pub async fn cmd_run(args: RunArgs, config_path: &std::path::Path) -> Result<(i32, Vec<(String, serde_json::Value)>, Vec<String>), PromptQaError> {
    let mut config = Config::load(config_path)?;
    apply_overrides(&mut config, &args.overrides);
    config.validate()?;

    let tests: Vec<crate::config::TestCase> = match &args.test {
        Some(name) => vec![config.resolve_test(Some(name))?.clone()],
        None => config.tests.clone(),
    };
    if tests.is_empty() {
        return Err(PromptQaError::config("no tests to run"));
    }

    let mut worst_exit_code = 0;
    let mut reports = Vec::with_capacity(tests.len());
    let mut human_reports = Vec::with_capacity(tests.len());

    for test in &tests {
        let report_path = args.overrides.report_path.join(&test.name);
        let (exit_code, json, markdown) = super::runtime::run_one(&config, test, args.strategy, &report_path).await?;
        worst_exit_code = worst_exit_code.max(exit_code);
        reports.push((test.name.clone(), json));
        human_reports.push(markdown);
    }

    Ok((worst_exit_code, reports, human_reports))
}
