//! Demo scenarios
//!
//! Each scenario builds a fresh runtime, drives it until the event loop is
//! idle and reports one [`Outcome`] per observed promise. An outcome is
//! unexpected when a promise settled differently than the scenario intends,
//! or never settled at all.

use crate::cli::{Cli, Scenario};
use crate::error::CliResult;
use core_types::{ErrorKind, Value};
use promise_runtime::{DebugEvent, EventLoop, FlavorKind, Promise, PromiseState, Runtime, RuntimeConfig};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use task_scheduler::TaskScheduler;

/// One observed result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// What was observed
    pub label: String,
    /// Final state of the promise
    pub state: PromiseState,
    /// The value, reason or note
    pub detail: String,
    /// Whether this is what the scenario intends
    pub expected: bool,
}

impl Outcome {
    fn of(label: impl Into<String>, promise: &Promise, rejection_ok: impl Fn(&Value) -> bool) -> Self {
        let label = label.into();
        match promise.outcome() {
            Some(Ok(value)) => Outcome {
                label,
                state: PromiseState::Resolved,
                detail: value.to_string(),
                expected: true,
            },
            Some(Err(reason)) => Outcome {
                label,
                state: PromiseState::Rejected,
                expected: rejection_ok(&reason),
                detail: reason.to_string(),
            },
            None => Outcome {
                label,
                state: promise.state(),
                detail: "never settled".to_string(),
                expected: false,
            },
        }
    }

    fn check(label: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Outcome {
            label: label.into(),
            state: if passed {
                PromiseState::Resolved
            } else {
                PromiseState::Rejected
            },
            detail: detail.into(),
            expected: passed,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.expected { "ok" } else { "UNEXPECTED" };
        write!(f, "[{}] {}: {} {}", mark, self.label, self.state, self.detail)
    }
}

/// Outcomes of one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: &'static str,
    /// Host time when the loop went idle
    pub elapsed_ms: u64,
    /// Everything observed, in order
    pub outcomes: Vec<Outcome>,
}

impl ScenarioReport {
    /// Outcomes the scenario did not intend.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.expected).count()
    }

    /// Returns true when every outcome was expected.
    pub fn passed(&self) -> bool {
        self.failures() == 0
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ({}ms)", self.scenario, self.elapsed_ms)?;
        for outcome in &self.outcomes {
            writeln!(f, "  {}", outcome)?;
        }
        Ok(())
    }
}

/// Builds runtimes from the CLI settings and runs scenarios on them.
pub struct ScenarioRunner {
    config: RuntimeConfig,
    virtual_time: bool,
    tasks: usize,
    task_timeout: Option<u64>,
}

impl ScenarioRunner {
    /// Creates a runner.
    pub fn new(config: RuntimeConfig, virtual_time: bool, tasks: usize, task_timeout: Option<u64>) -> Self {
        Self {
            config,
            virtual_time,
            tasks,
            task_timeout,
        }
    }

    /// Creates a runner from parsed arguments, loading `--config` if given.
    pub fn from_cli(cli: &Cli) -> CliResult<Self> {
        Ok(Self::new(cli.runtime_config()?, cli.virtual_time, cli.tasks, cli.task_timeout))
    }

    /// Runs `scenario`, expanding `all`.
    pub fn run(&self, scenario: Scenario) -> Vec<ScenarioReport> {
        scenario
            .expand()
            .into_iter()
            .map(|s| {
                tracing::info!(event = "scenario.start", scenario = s.as_str(), "Running scenario");
                let report = match s {
                    Scenario::Flavors => self.flavors(),
                    Scenario::Unhandled => self.unhandled(),
                    Scenario::Scheduler | Scenario::All => self.scheduler(),
                };
                tracing::info!(
                    event = "scenario.finish",
                    scenario = report.scenario,
                    failures = report.failures(),
                    "Scenario finished"
                );
                report
            })
            .collect()
    }

    fn runtime(&self) -> Runtime {
        let event_loop = if self.virtual_time {
            EventLoop::with_virtual_clock()
        } else {
            EventLoop::new()
        };
        let runtime = Runtime::with_config(event_loop, self.config.clone());
        if self.config.debug {
            runtime.set_promise_debug_state(true, Some(Rc::new(print_debug_event)));
        }
        runtime
    }

    /// Continuation timing for every flavor, then each combinator once.
    fn flavors(&self) -> ScenarioReport {
        let runtime = self.runtime();
        let start = runtime.now_ms();
        let order = Rc::new(RefCell::new(Vec::<String>::new()));
        let mut observed = Vec::new();

        for kind in [
            FlavorKind::Native,
            FlavorKind::Idle,
            FlavorKind::Async,
            FlavorKind::Sync,
        ] {
            let o = order.clone();
            let chained = runtime.flavor(kind).resolved(kind.as_str()).and_then(move |value| {
                o.borrow_mut().push(value.to_string());
                Ok(value)
            });
            observed.push((format!("then/{}", kind), chained));
        }

        let flavor = runtime.default_flavor();
        let all = flavor.all(vec![
            flavor.resolved(1).into(),
            flavor.timeout(5, Some(Value::Smi(2))).into(),
            Value::Smi(3),
        ]);
        let all_settled = flavor.all_settled(vec![flavor.resolved("kept").into(), flavor.rejected("dropped").into()]);
        let race = flavor.race(vec![
            flavor.timeout(20, Some(Value::from("slow"))).into(),
            flavor.timeout(5, Some(Value::from("fast"))).into(),
        ]);
        let any = flavor.any(vec![flavor.rejected("first").into(), flavor.timeout(5, Some(Value::from("second"))).into()]);
        let timeout = flavor.timeout(5, None);
        timeout.catch(|_| Ok(Value::Undefined));

        runtime.run_until_idle();

        let mut outcomes: Vec<Outcome> = observed
            .into_iter()
            .map(|(label, promise)| Outcome::of(label, &promise, |_| false))
            .collect();
        outcomes.push(Outcome::check(
            "continuation order",
            order.borrow().first().map(String::as_str) == Some("sync"),
            order.borrow().join(" -> "),
        ));
        outcomes.push(Outcome::of("all", &all, |_| false));
        outcomes.push(Outcome::of("all_settled", &all_settled, |_| false));
        outcomes.push(Outcome::of("race", &race, |_| false));
        outcomes.push(Outcome::of("any", &any, |_| false));
        outcomes.push(Outcome::of("timeout", &timeout, |r| is_error(r, ErrorKind::TimeoutError)));

        ScenarioReport {
            scenario: Scenario::Flavors.as_str(),
            elapsed_ms: runtime.now_ms().saturating_sub(start),
            outcomes,
        }
    }

    /// One rejection nobody observes, one observed within the grace period.
    fn unhandled(&self) -> ScenarioReport {
        let runtime = self.runtime();
        let start = runtime.now_ms();
        let reports = Rc::new(RefCell::new(Vec::<String>::new()));
        let r = reports.clone();
        runtime.on_unhandled_rejection(move |rejection| {
            tracing::info!(
                event = "scenario.unhandled.report",
                promise = rejection.promise.id(),
                reason = %rejection.reason,
                "Unhandled rejection reported"
            );
            r.borrow_mut().push(rejection.reason.to_string());
        });

        let flavor = runtime.default_flavor();
        let ignored = flavor.rejected("nobody listens");
        let late = flavor.rejected("observed in time");
        let observer = late.clone();
        runtime.event_loop().set_timeout(runtime.unhandled_grace_ms() / 2, move || {
            observer.catch(|_| Ok(Value::Undefined));
        });

        runtime.run_until_idle();

        let reports = reports.borrow();
        let outcomes = vec![
            Outcome::check(
                format!("promise #{} reported", ignored.id()),
                reports.iter().any(|r| r == "nobody listens"),
                format!("{} report(s)", reports.len()),
            ),
            Outcome::check(
                format!("promise #{} not reported", late.id()),
                !reports.iter().any(|r| r == "observed in time"),
                "handled within grace period",
            ),
        ];
        ScenarioReport {
            scenario: Scenario::Unhandled.as_str(),
            elapsed_ms: runtime.now_ms().saturating_sub(start),
            outcomes,
        }
    }

    /// `tasks` sleeping tasks through one scheduler; task `n` sleeps
    /// `n * 10` ms. Timeouts and stale evictions are expected rejections.
    fn scheduler(&self) -> ScenarioReport {
        let runtime = self.runtime();
        let start = runtime.now_ms();
        let scheduler = TaskScheduler::new(&runtime, None, Some("demo"));
        let work = runtime.asynchronous(None);

        let queued: Vec<Promise> = (1..=self.tasks)
            .map(|n| {
                let delay_ms = n as u64 * 10;
                let flavor = work.clone();
                let promise = scheduler.queue(
                    move |id| {
                        tracing::info!(event = "scenario.task.run", task = id, delay_ms, "Task running");
                        Ok(flavor.timeout(delay_ms, Some(Value::from(format!("{} done", id)))).into())
                    },
                    Some(format!("sleep{}", delay_ms).as_str()),
                    self.task_timeout,
                );
                promise.catch(|_| Ok(Value::Undefined));
                promise
            })
            .collect();

        runtime.run_until_idle();

        let mut outcomes: Vec<Outcome> = queued
            .iter()
            .enumerate()
            .map(|(i, promise)| {
                Outcome::of(format!("task {}", i + 1), promise, |r| {
                    is_error(r, ErrorKind::TimeoutError) || is_error(r, ErrorKind::AbortError)
                })
            })
            .collect();
        outcomes.push(Outcome::check(
            "scheduler idle",
            scheduler.is_idle(),
            format!("{} running, {} waiting", scheduler.running_count(), scheduler.waiting_count()),
        ));
        ScenarioReport {
            scenario: Scenario::Scheduler.as_str(),
            elapsed_ms: runtime.now_ms().saturating_sub(start),
            outcomes,
        }
    }
}

fn is_error(reason: &Value, kind: ErrorKind) -> bool {
    reason.as_error().is_some_and(|e| e.kind == kind)
}

fn print_debug_event(event: &DebugEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::warn!(event = "scenario.debug.encode", error = %e, "Could not encode debug event"),
    }
}
