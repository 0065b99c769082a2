//! Processors decide when a batch of continuations runs.
//!
//! A settlement hands all of its reactions to its flavor's processor at once.
//! The processor is the only place where the four flavors differ: everything
//! else about settlement is shared.

use crate::event_loop::run_isolated;
use crate::runtime::Runtime;
use crate::task_queue::Job;

/// Schedules the execution of continuation batches.
///
/// Implementations must run every job of a batch exactly once, in order, and
/// must keep running the rest of the batch if one job panics.
pub trait Processor {
    /// Schedules `batch` for execution.
    fn process(&self, runtime: &Runtime, batch: Vec<Job>);

    /// Short name used in trace output.
    fn name(&self) -> &'static str;
}

fn run_batch(batch: Vec<Job>) {
    for job in batch {
        run_isolated(job);
    }
}

/// Runs the batch immediately, inside the settling call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncProcessor;

impl Processor for SyncProcessor {
    fn process(&self, _runtime: &Runtime, batch: Vec<Job>) {
        run_batch(batch);
    }

    fn name(&self) -> &'static str {
        "sync"
    }
}

/// Runs the batch from one host timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerProcessor {
    /// Timer delay in milliseconds
    pub delay_ms: u64,
}

impl TimerProcessor {
    /// Creates a processor deferring by `delay_ms`.
    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Processor for TimerProcessor {
    fn process(&self, runtime: &Runtime, batch: Vec<Job>) {
        let size = batch.len();
        let timer_id = runtime.event_loop().set_timeout(self.delay_ms, move || run_batch(batch));
        tracing::trace!(
            event = "processor.timer.schedule",
            timer_id,
            delay_ms = self.delay_ms,
            size,
            "Continuation batch deferred"
        );
    }

    fn name(&self) -> &'static str {
        "timer"
    }
}

/// Runs the batch when the host is idle.
///
/// Without an explicit deadline the runtime's default idle timeout applies,
/// read at scheduling time. Hosts without idle support get a zero-delay timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleProcessor {
    /// Deadline hint in milliseconds
    pub timeout_ms: Option<u64>,
}

impl IdleProcessor {
    /// Creates a processor with an optional deadline hint.
    pub fn new(timeout_ms: Option<u64>) -> Self {
        Self { timeout_ms }
    }
}

impl Processor for IdleProcessor {
    fn process(&self, runtime: &Runtime, batch: Vec<Job>) {
        let event_loop = runtime.event_loop();
        if !event_loop.supports_idle() {
            TimerProcessor::new(0).process(runtime, batch);
            return;
        }
        let timeout_ms = self.timeout_ms.or_else(|| runtime.default_idle_timeout());
        let size = batch.len();
        let id = event_loop.request_idle_callback(timeout_ms, move || run_batch(batch));
        tracing::trace!(
            event = "processor.idle.schedule",
            id,
            ?timeout_ms,
            size,
            "Continuation batch deferred to idle"
        );
    }

    fn name(&self) -> &'static str {
        "idle"
    }
}

/// Runs each job of the batch on the host's microtask queue.
///
/// Falls back to a zero-delay timer when the host has no microtasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProcessor;

impl Processor for NativeProcessor {
    fn process(&self, runtime: &Runtime, batch: Vec<Job>) {
        let event_loop = runtime.event_loop();
        if !event_loop.supports_microtasks() {
            TimerProcessor::new(0).process(runtime, batch);
            return;
        }
        for job in batch {
            event_loop.queue_microtask(move || run_isolated(job));
        }
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
