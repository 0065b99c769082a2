//! Unit tests for promise_runtime

mod await_test;
mod debug_test;
mod event_loop_test;
mod property_test;
mod unhandled_test;

use promise_runtime::{EventLoop, Runtime};

/// A runtime on a virtual clock starting at zero.
pub(crate) fn virtual_runtime() -> Runtime {
    Runtime::with_event_loop(EventLoop::with_virtual_clock())
}
