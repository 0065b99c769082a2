//! Host event loop.
//!
//! This module provides the minimal host the promise flavors defer to:
//! one-shot and repeating timers, idle callbacks and a microtask queue, all
//! driven from a single thread. Each turn of the loop:
//! 1. Runs the oldest microtask, if any
//! 2. Runs the earliest due timer
//! 3. Runs idle callbacks whose deadline has passed
//! 4. If nothing else is runnable, runs the pending idle callbacks
//! 5. Otherwise waits on the clock until the next timer deadline

use crate::clock::{Clock, SystemClock, VirtualClock};
use crate::task_queue::{DueTimer, IdleQueue, Job, MicrotaskQueue, TimerEntry, TimerId, TimerQueue};
use core_types::JsError;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Features the host exposes to promise flavors.
///
/// Flavors probe these to decide whether to use the primitive or fall back to
/// plain timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// A built-in job queue for native promise reactions
    pub microtasks: bool,
    /// Idle-period callbacks
    pub idle: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            microtasks: true,
            idle: true,
        }
    }
}

#[derive(Default)]
struct LoopState {
    seq: u64,
    next_timer_id: TimerId,
    timers: TimerQueue,
    microtasks: MicrotaskQueue,
    idle: IdleQueue,
}

impl LoopState {
    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    fn next_id(&mut self) -> TimerId {
        self.next_timer_id += 1;
        self.next_timer_id
    }
}

/// The single-threaded host event loop.
///
/// `EventLoop` is a cheap handle; clones share the same queues and clock.
///
/// # Examples
///
/// ```
/// use promise_runtime::EventLoop;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let event_loop = EventLoop::with_virtual_clock();
/// let fired = Rc::new(Cell::new(0));
/// let f = fired.clone();
/// event_loop.set_timeout(100, move || f.set(f.get() + 1));
///
/// event_loop.run_until_idle();
/// assert_eq!(fired.get(), 1);
/// assert_eq!(event_loop.now_ms(), 100);
/// ```
#[derive(Clone)]
pub struct EventLoop {
    state: Rc<RefCell<LoopState>>,
    clock: Rc<dyn Clock>,
    capabilities: HostCapabilities,
}

impl EventLoop {
    /// Creates an event loop on the wall clock with every capability.
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock::new()))
    }

    /// Creates an event loop on a fresh [`VirtualClock`] starting at zero.
    pub fn with_virtual_clock() -> Self {
        Self::with_clock(Rc::new(VirtualClock::new(0)))
    }

    /// Creates an event loop on a custom clock.
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self::with_capabilities(clock, HostCapabilities::default())
    }

    /// Creates an event loop that only exposes some host features.
    pub fn with_capabilities(clock: Rc<dyn Clock>, capabilities: HostCapabilities) -> Self {
        Self {
            state: Rc::new(RefCell::new(LoopState::default())),
            clock,
            capabilities,
        }
    }

    /// The features this host offers.
    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// Returns true if the host has a native job queue.
    pub fn supports_microtasks(&self) -> bool {
        self.capabilities.microtasks
    }

    /// Returns true if the host can run callbacks during idle periods.
    pub fn supports_idle(&self) -> bool {
        self.capabilities.idle
    }

    /// Current time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Schedules `job` to run once after `delay_ms`.
    pub fn set_timeout<F>(&self, delay_ms: u64, job: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let deadline_ms = self.now_ms().saturating_add(delay_ms);
        let mut state = self.state.borrow_mut();
        let timer_id = state.next_id();
        let seq = state.next_seq();
        state.timers.schedule(
            TimerEntry {
                timer_id,
                deadline_ms,
                seq,
            },
            Box::new(job),
        );
        tracing::trace!(
            event = "event_loop.timer.set",
            timer_id,
            delay_ms,
            deadline_ms,
            "Timer scheduled"
        );
        timer_id
    }

    /// Schedules `callback` to run every `period_ms` until cleared.
    pub fn set_interval<F>(&self, period_ms: u64, callback: F) -> TimerId
    where
        F: Fn() + 'static,
    {
        let period_ms = period_ms.max(1);
        let deadline_ms = self.now_ms().saturating_add(period_ms);
        let mut state = self.state.borrow_mut();
        let timer_id = state.next_id();
        let seq = state.next_seq();
        state.timers.schedule_repeating(
            TimerEntry {
                timer_id,
                deadline_ms,
                seq,
            },
            period_ms,
            Rc::new(callback),
        );
        tracing::trace!(
            event = "event_loop.interval.set",
            timer_id,
            period_ms,
            "Interval scheduled"
        );
        timer_id
    }

    /// Cancels a timer, interval or idle callback.
    ///
    /// Returns true if it had not yet run (intervals: had not been cleared).
    pub fn clear_timeout(&self, timer_id: TimerId) -> bool {
        let mut state = self.state.borrow_mut();
        let cancelled = state.timers.cancel(timer_id) || state.idle.cancel(timer_id);
        tracing::trace!(
            event = "event_loop.timer.cancel",
            timer_id,
            cancelled,
            "Timer cancelled"
        );
        cancelled
    }

    /// Adds a job to the native job queue.
    pub fn queue_microtask<F>(&self, job: F)
    where
        F: FnOnce() + 'static,
    {
        self.state.borrow_mut().microtasks.enqueue(Box::new(job));
    }

    /// Runs `job` the next time the loop is idle, or once `timeout_ms` elapses.
    pub fn request_idle_callback<F>(&self, timeout_ms: Option<u64>, job: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let deadline_ms = timeout_ms.map(|t| self.now_ms().saturating_add(t));
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.idle.enqueue(id, deadline_ms, Box::new(job));
        tracing::trace!(
            event = "event_loop.idle.request",
            id,
            ?deadline_ms,
            "Idle callback requested"
        );
        id
    }

    /// Returns true if any timer, microtask or idle callback is outstanding.
    pub fn has_pending(&self) -> bool {
        let state = self.state.borrow();
        !state.timers.is_empty() || !state.microtasks.is_empty() || !state.idle.is_empty()
    }

    /// Number of armed timers and intervals.
    pub fn timer_count(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.state.borrow().microtasks.is_empty()
    }

    /// Runs until no work remains.
    ///
    /// Returns the number of jobs executed. A live interval keeps the loop
    /// running until it is cleared.
    pub fn run_until_idle(&self) -> usize {
        let mut executed = 0;
        while self.turn(None) {
            executed += 1;
        }
        executed
    }

    /// Runs every job due within the next `duration_ms`, then leaves the clock
    /// at the end of that window.
    pub fn run_for(&self, duration_ms: u64) -> usize {
        let until = self.now_ms().saturating_add(duration_ms);
        let mut executed = 0;
        while self.turn(Some(until)) {
            executed += 1;
        }
        self.clock.wait_until(until);
        executed
    }

    /// Drains the microtask queue only.
    pub fn run_microtasks(&self) -> usize {
        let mut executed = 0;
        loop {
            let job = self.state.borrow_mut().microtasks.dequeue();
            match job {
                Some(job) => {
                    run_isolated(job);
                    executed += 1;
                }
                None => return executed,
            }
        }
    }

    /// Performs one step. Returns false when nothing was runnable before
    /// `limit_ms`.
    fn turn(&self, limit_ms: Option<u64>) -> bool {
        let microtask = self.state.borrow_mut().microtasks.dequeue();
        if let Some(job) = microtask {
            run_isolated(job);
            return true;
        }

        let now = self.now_ms();
        let due = {
            let mut state = self.state.borrow_mut();
            let seq = state.seq;
            let due = state.timers.pop_due(now, seq);
            if due.is_some() {
                state.seq += 1;
            }
            due
        };
        if let Some((entry, due)) = due {
            tracing::trace!(
                event = "event_loop.timer.fire",
                timer_id = entry.timer_id,
                deadline_ms = entry.deadline_ms,
                now_ms = now,
                "Timer fired"
            );
            match due {
                DueTimer::Once(job) => run_isolated(job),
                DueTimer::Repeat(callback) => run_isolated(Box::new(move || callback())),
            }
            return true;
        }

        let expired = self.state.borrow_mut().idle.take_expired(now);
        if let Some(job) = expired {
            run_isolated(job);
            return true;
        }

        let idle_jobs = self.state.borrow_mut().idle.take_all();
        if !idle_jobs.is_empty() {
            tracing::trace!(
                event = "event_loop.idle.run",
                count = idle_jobs.len(),
                "Running idle callbacks"
            );
            for job in idle_jobs {
                run_isolated(job);
            }
            return true;
        }

        let next_deadline = self.state.borrow_mut().timers.next_deadline();
        match next_deadline {
            Some(deadline) if limit_ms.map_or(true, |limit| deadline <= limit) => {
                self.clock.wait_until(deadline);
                true
            }
            _ => false,
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventLoop")
            .field("now_ms", &self.clock.now_ms())
            .field("timers", &state.timers.len())
            .field("microtasks", &state.microtasks.len())
            .field("idle", &state.idle.len())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Runs a job, containing any panic so that sibling jobs still run.
pub(crate) fn run_isolated(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let error = JsError::from_panic(payload.as_ref());
        tracing::error!(
            event = "event_loop.job.panic",
            message = %error.message,
            "Deferred job panicked; continuing with remaining jobs"
        );
    }
}
