//! Deferred-value runtime driver
//!
//! Entry point for `deferred-run`. Parses CLI arguments, installs the log
//! subscriber and delegates to the ScenarioRunner.

use clap::Parser as ClapParser;
use promise_cli::{Cli, CliError, CliResult, ScenarioRunner};
use tracing_subscriber::EnvFilter;

fn run(cli: &Cli) -> CliResult<()> {
    let runner = ScenarioRunner::from_cli(cli)?;
    let reports = runner.run(cli.scenario);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print!("{}", report);
        }
    }

    match reports.iter().find(|r| !r.passed()) {
        Some(report) => Err(CliError::Unexpected {
            scenario: report.scenario.to_string(),
            failures: report.failures(),
        }),
        None => Ok(()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
