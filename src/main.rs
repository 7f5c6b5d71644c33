//! Argo acceptance-test CLI
//!
//! Submits the workflows declared by YAML test scenarios, waits for them to
//! finish, and checks their final status, step phases and step logs.

use argo_acceptance::{cli, commands::RunArgs, common::logging};
use clap::Parser;

#[derive(Parser)]
#[command(name = "argo-acceptance", about = "Scenario-driven acceptance tests for Argo Workflows")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    args: RunArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.args.verbose);

    match cli::dispatch(cli.args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
