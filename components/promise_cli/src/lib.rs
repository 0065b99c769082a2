//! Deferred-value runtime driver
//!
//! Library half of the `deferred-run` binary: argument parsing, config
//! loading and the demo scenarios that exercise the promise flavors, the
//! unhandled-rejection detector and the task scheduler.
//!
//! # Examples
//!
//! ```
//! use clap::Parser;
//! use promise_cli::{Cli, Scenario, ScenarioRunner};
//!
//! let cli = Cli::try_parse_from(["deferred-run", "--virtual-time", "--tasks", "2"]).unwrap();
//! let runner = ScenarioRunner::from_cli(&cli).unwrap();
//! let reports = runner.run(Scenario::Scheduler);
//! assert!(reports.iter().all(|r| r.passed()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod scenarios;

pub use cli::{Cli, Scenario};
pub use error::{CliError, CliResult};
pub use scenarios::{Outcome, ScenarioReport, ScenarioRunner};
