use super::commands::Commands;
use super::env::CliArgs;
use super::run::cmd_run;
use super::test::cmd_test;
use crate::errors::PromptQaError;

/// Dispatches the parsed command, prints its report to stdout (JSON or
/// markdown per `--json`), and returns the process exit code.
pub async fn dispatch(cli: CliArgs) -> Result<i32, PromptQaError> {
    match cli.command {
        Commands::Test(args) => {
            let json_requested = args.overrides.json;
            let (exit_code, json, markdown) = cmd_test(args, &cli.config).await?;
            emit_one(json_requested, &json, &markdown);
            Ok(exit_code)
        }
        Commands::Run(args) => {
            let json_requested = args.overrides.json;
            let (exit_code, reports, markdowns) = cmd_run(args, &cli.config).await?;
            emit_many(json_requested, reports, markdowns);
            Ok(exit_code)
        }
    }
}

fn emit_one(json_requested: bool, json: &serde_json::Value, markdown: &str) {
    if json_requested {
        println!("{}", crate::report::serialize_json(json));
    } else {
        println!("{markdown}");
    }
}

fn emit_many(json_requested: bool, reports: Vec<(String, serde_json::Value)>, markdowns: Vec<String>) {
    if json_requested {
        let combined = serde_json::json!({
            "tests": reports
                .into_iter()
                .map(|(name, summary)| serde_json::json!({ "name": name, "summary": summary }))
                .collect::<Vec<_>>(),
        });
        println!("{}", crate::report::serialize_json(&combined));
    } else {
        for markdown in markdowns {
            println!("{markdown}");
        }
    }
}
