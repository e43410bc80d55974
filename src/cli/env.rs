use std::path::PathBuf;

use clap::{Args, Parser};

use super::commands::Commands;
use crate::config::DEFAULT_CONFIG_PATH;

/// Non-interactive, LLM-driven browser tester.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log level (overridden by `RUST_LOG` if set).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug-level logging regardless of `--log-level`.
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by both `test` and `run`; every one of these overrides the
/// loaded config, which in turn overrides environment defaults.
#[derive(Args, Clone, Default)]
pub struct CommonOverrides {
    /// Emit the run summary as JSON on stdout instead of a human report.
    #[arg(long)]
    pub json: bool,

    /// Directory artifacts (screenshots, step records, reports) are written under.
    #[arg(long, value_name = "DIR", default_value = ".artifacts")]
    pub report_path: PathBuf,

    /// Overrides `maxSteps` from the config file.
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Runs Chromium headless.
    #[arg(long)]
    pub headless: bool,

    /// Overrides the total run timeout, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Raw `name=value; name2=value2` cookie string applied before navigation.
    #[arg(long)]
    pub cookie: Option<String>,

    /// Natural-language login goal run in a bounded sub-loop before the main prompt.
    #[arg(long)]
    pub login_prompt: Option<String>,
}
