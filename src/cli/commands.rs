use clap::Subcommand;

use super::run::RunArgs;
use super::test::TestArgs;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single ad-hoc test against a URL and a natural-language prompt.
    Test(TestArgs),

    /// Run every test defined in the config file, or one named test.
    Run(RunArgs),
}
