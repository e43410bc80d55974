use clap::Parser;

use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::init_logging;

/// Process entrypoint: parse args, initialize logging, dispatch, and map
/// any error to its exit code. All human progress goes to stderr via
/// `tracing`; the chosen subcommand writes its report (JSON or markdown)
/// to stdout.
pub async fn run() -> i32 {
    let cli = CliArgs::parse();

    if let Err(err) = init_logging(&cli.log_level, cli.debug) {
        eprintln!("failed to initialize logging: {err}");
        return 4;
    }

    match dispatch(cli).await {
        Ok(exit_code) => exit_code,
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            err.exit_code()
        }
    }
}
