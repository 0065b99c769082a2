//! Per-task bookkeeping.

use core_types::Value;
use promise_runtime::{Promise, Rejecter, TimerId};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;

/// Where a queued task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Queued behind another task
    Waiting,
    /// Start function invoked, outcome not yet known
    Running,
    /// Start function's outcome has been delivered
    Settled,
    /// Rejected by a timeout or the stale sweep
    Aborted,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Settled => "settled",
            TaskState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One queued task.
///
/// The reject guard (`reject_fn`) is taken exactly once, by whichever of
/// completion, timeout or stale eviction gets there first.
pub struct TaskDetail {
    id: String,
    created_at: u64,
    started_at: Cell<Option<u64>>,
    timeout_ms: Option<u64>,
    promise: RefCell<Option<Promise>>,
    reject_reason: RefCell<Option<Value>>,
    reject_fn: RefCell<Option<Rejecter>>,
    timeout_timer: Cell<Option<TimerId>>,
    finished: Cell<bool>,
}

impl TaskDetail {
    pub(crate) fn new(id: String, created_at: u64, timeout_ms: Option<u64>) -> Self {
        Self {
            id,
            created_at,
            started_at: Cell::new(None),
            timeout_ms,
            promise: RefCell::new(None),
            reject_reason: RefCell::new(None),
            reject_fn: RefCell::new(None),
            timeout_timer: Cell::new(None),
            finished: Cell::new(false),
        }
    }

    /// Task id: scheduler name, sequence number and optional label.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Host time the task was queued at.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Host time the start function was invoked at.
    pub fn started_at(&self) -> Option<u64> {
        self.started_at.get()
    }

    /// Per-task timeout, armed once the task returns a pending thenable.
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    /// The promise handed back by `queue`.
    pub fn promise(&self) -> Option<Promise> {
        self.promise.borrow().clone()
    }

    /// Why the task was aborted, if it was.
    pub fn reject_reason(&self) -> Option<Value> {
        self.reject_reason.borrow().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        if self.reject_reason.borrow().is_some() {
            TaskState::Aborted
        } else if self.finished.get() {
            TaskState::Settled
        } else if self.started_at.get().is_some() {
            TaskState::Running
        } else {
            TaskState::Waiting
        }
    }

    pub(crate) fn mark_started(&self, now_ms: u64) {
        self.started_at.set(Some(now_ms));
    }

    pub(crate) fn set_promise(&self, promise: Promise) {
        *self.promise.borrow_mut() = Some(promise);
    }

    pub(crate) fn arm_reject(&self, reject: Rejecter) {
        *self.reject_fn.borrow_mut() = Some(reject);
    }

    pub(crate) fn can_reject(&self) -> bool {
        self.reject_fn.borrow().is_some()
    }

    pub(crate) fn take_reject(&self) -> Option<Rejecter> {
        self.reject_fn.borrow_mut().take()
    }

    pub(crate) fn set_reject_reason(&self, reason: Value) {
        *self.reject_reason.borrow_mut() = Some(reason);
    }

    pub(crate) fn set_timeout_timer(&self, timer: TimerId) {
        self.timeout_timer.set(Some(timer));
    }

    pub(crate) fn take_timeout_timer(&self) -> Option<TimerId> {
        self.timeout_timer.take()
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.set(true);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Returns true if the task has outlived `stale_timeout_ms` at `now_ms`.
    ///
    /// Running tasks are measured from their start, waiting ones from when
    /// they were queued.
    pub(crate) fn is_stale(&self, now_ms: u64, stale_timeout_ms: u64) -> bool {
        let since = self.started_at.get().unwrap_or(self.created_at);
        now_ms.saturating_sub(since) > stale_timeout_ms
    }
}

impl fmt::Debug for TaskDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDetail")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .field("started_at", &self.started_at.get())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
