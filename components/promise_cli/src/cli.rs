//! Command line arguments

use crate::error::CliResult;
use clap::{Parser, ValueEnum};
use promise_runtime::{FlavorKind, RuntimeConfig};
use std::path::PathBuf;

/// Which demo to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Every scenario, one after another
    All,
    /// FIFO task scheduling with timeouts and stale eviction
    Scheduler,
    /// Unhandled-rejection reporting
    Unhandled,
    /// Continuation timing per flavor, plus the combinators
    Flavors,
}

impl Scenario {
    /// The scenarios `self` expands to.
    pub fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => vec![Scenario::Flavors, Scenario::Unhandled, Scenario::Scheduler],
            other => vec![other],
        }
    }

    /// Lower-case name, as accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::All => "all",
            Scenario::Scheduler => "scheduler",
            Scenario::Unhandled => "unhandled",
            Scenario::Flavors => "flavors",
        }
    }
}

/// Deferred-value runtime driver
#[derive(Debug, Parser)]
#[command(name = "deferred-run", version, about = "Drive demo scenarios through the promise runtime")]
pub struct Cli {
    /// Scenario to run
    #[arg(short, long, value_enum, default_value_t = Scenario::All)]
    pub scenario: Scenario,

    /// Default promise flavor (sync, async, idle or native)
    #[arg(short, long)]
    pub flavor: Option<FlavorKind>,

    /// Number of tasks the scheduler scenario queues
    #[arg(short = 'n', long, default_value_t = 3)]
    pub tasks: usize,

    /// Per-task timeout in the scheduler scenario
    #[arg(long, value_name = "MS")]
    pub task_timeout: Option<u64>,

    /// Stale-task timeout; 0 disables the sweep
    #[arg(long, value_name = "MS")]
    pub stale_timeout: Option<u64>,

    /// Run on a virtual clock instead of waiting in real time
    #[arg(long)]
    pub virtual_time: bool,

    /// Print every promise state transition as a JSON line
    #[arg(short, long)]
    pub debug: bool,

    /// JSON file with runtime settings; flags take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print reports as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Builds the runtime settings from the config file and the flags.
    pub fn runtime_config(&self) -> CliResult<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str(&text)?
            }
            None => RuntimeConfig::default(),
        };
        if let Some(kind) = self.flavor {
            config.default_flavor = kind;
        }
        if let Some(ms) = self.stale_timeout {
            config.stale_timeout_ms = ms;
        }
        if self.debug {
            config.debug = true;
        }
        Ok(config)
    }
}
