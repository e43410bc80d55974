use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::env::CommonOverrides;
use super::test::Strategy;
use crate::config::{Config, TestCase};
use crate::errors::PromptQaError;
use crate::llm::build_client;
use crate::session::Session;

/// Initializes `tracing` once for the process. Respects `RUST_LOG` if set;
/// otherwise falls back to `--log-level` (or `debug` when `--debug` is
/// passed). Always writes to stderr so stdout stays reserved for `--json`.
pub fn init_logging(level: &str, debug: bool) -> Result<(), PromptQaError> {
    let level = if debug { "debug".to_string() } else { level.to_string() };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Loads `config_path` if it exists (for its defaults: `maxSteps`,
/// `timeout`, `headless`, `provider`, `model`, `auth`); otherwise builds a
/// minimal ad-hoc config from the CLI-supplied url/prompt. Either way,
/// `baseUrl` is always the CLI-supplied `url`.
pub fn resolve_config(config_path: &Path, url: &str, prompt: &str) -> Result<Config, PromptQaError> {
    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        Config::from_single_test(url, prompt)
    };
    config.base_url = url.to_string();
    Ok(config)
}

/// Applies CLI flag overrides onto a loaded config. CLI flags always win
/// over the config file, which in turn wins over environment defaults.
pub fn apply_overrides(config: &mut Config, overrides: &CommonOverrides) {
    if let Some(max_steps) = overrides.max_steps {
        config.max_steps = max_steps;
    }
    if overrides.headless {
        config.headless = true;
    }
    if let Some(timeout) = overrides.timeout {
        config.timeout = timeout;
    }
    if let Some(cookie) = &overrides.cookie {
        config.auth.cookie = Some(cookie.clone());
    }
    if let Some(login_prompt) = &overrides.login_prompt {
        config.auth.login_prompt = Some(login_prompt.clone());
    }
}

/// Runs one test end to end: bootstraps a session, drives the chosen loop
/// engine, writes `summary.json`/`report.md` under `report_path`, and
/// returns the exit code plus both rendered reports.
pub async fn run_one(
    config: &Config,
    test: &TestCase,
    strategy: Strategy,
    report_path: &Path,
) -> Result<(i32, serde_json::Value, String), PromptQaError> {
    let url = config.test_url(test).to_string();
    let provider = config.resolve_provider()?;
    let llm = build_client(provider, config.model.as_deref())?;

    tracing::info!(test = %test.name, url = %url, strategy = ?strategy, "starting run");

    let session = Session::bootstrap(config.headless, &url, &config.auth).await?;
    let login_prompt = config.auth.login_prompt.as_deref();

    let run_result = match strategy {
        Strategy::PlanOnce => {
            crate::plan_once::run(llm.as_ref(), session.page(), &url, &test.prompt, config.max_steps, config.timeout, login_prompt, Some(report_path)).await
        }
        Strategy::Agent => {
            crate::agent_loop::run(llm.as_ref(), session.page(), &url, &test.prompt, config.timeout, login_prompt, Some(report_path)).await
        }
    };

    session.close().await?;
    let (run_summary, exit_code) = run_result?;

    let json = crate::report::generate_json(&run_summary, exit_code);
    let markdown = crate::report::generate_markdown(&run_summary, exit_code);
    persist_reports(report_path, &json, &markdown).await;

    tracing::info!(test = %test.name, verdict = run_summary.summary.as_str(), exit_code, "run finished");
    Ok((exit_code, json, markdown))
}

async fn persist_reports(report_path: &Path, json: &serde_json::Value, markdown: &str) {
    if let Err(err) = tokio::fs::create_dir_all(report_path).await {
        tracing::warn!(error = %err, "failed to create report directory");
        return;
    }
    let summary_path = report_path.join("summary.json");
    if let Err(err) = tokio::fs::write(&summary_path, crate::report::serialize_json(json)).await {
        tracing::warn!(path = %summary_path.display(), error = %err, "failed to write summary.json");
    }
    let report_md_path = report_path.join("report.md");
    if let Err(err) = tokio::fs::write(&report_md_path, markdown).await {
        tracing::warn!(path = %report_md_path.display(), error = %err, "failed to write report.md");
    }
}
