//! Unit tests for task_scheduler

mod scheduler_test;

use promise_runtime::{EventLoop, Runtime};

/// A runtime on a virtual clock starting at zero.
pub(crate) fn virtual_runtime() -> Runtime {
    Runtime::with_event_loop(EventLoop::with_virtual_clock())
}
