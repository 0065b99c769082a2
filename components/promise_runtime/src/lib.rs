//! Deferred-value runtime.
//!
//! This crate implements promise settlement semantics on top of a minimal
//! single-threaded host:
//! - Thenable flattening, exactly-once settlement and chained propagation
//! - Four interchangeable flavors that differ only in when continuations run
//! - List combinators (`all`, `all_settled`, `race`, `any`) and timeout promises
//! - Await-style helpers that accept plain values and thenables alike
//! - Unhandled-rejection detection with a grace period
//!
//! # Overview
//!
//! - [`Runtime`] - Composition root: event loop, settings, diagnostics
//! - [`Flavor`] - Factory for promises of one deferral strategy
//! - [`Promise`] - Handle to one settlement
//! - [`EventLoop`] - Host timers, idle callbacks and microtasks
//! - [`do_await`], [`do_await_response`], [`do_finally`] - Await combinators
//!
//! # Examples
//!
//! ```
//! use core_types::Value;
//! use promise_runtime::{EventLoop, PromiseState, Runtime};
//!
//! let runtime = Runtime::with_event_loop(EventLoop::with_virtual_clock());
//! let flavor = runtime.asynchronous(Some(10));
//!
//! let slow = flavor.timeout(100, Some(Value::from("slow")));
//! let fast = flavor.timeout(20, Some(Value::from("fast")));
//! let winner = flavor.race(vec![slow.into(), fast.into()]);
//!
//! runtime.run_until_idle();
//! assert_eq!(winner.state(), PromiseState::Resolved);
//! assert_eq!(winner.outcome(), Some(Ok(Value::from("fast"))));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod aggregate;
pub mod await_ops;
pub mod clock;
pub mod config;
pub mod debug;
pub mod event_loop;
pub mod flavor;
pub mod processor;
pub mod promise;
pub mod runtime;
pub mod task_queue;
pub mod unhandled;

// Re-export main types at crate root
pub use await_ops::{do_await, do_await_response, do_finally, AwaitResponse};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use config::{FlavorKind, RuntimeConfig, DEFAULT_STALE_TIMEOUT_MS, DEFAULT_UNHANDLED_GRACE_MS};
pub use debug::{DebugEvent, DebugLogger, PromiseDebugInfo};
pub use event_loop::{EventLoop, HostCapabilities};
pub use flavor::{create_async_promise, create_idle_promise, create_native_promise, create_sync_promise, Flavor};
pub use processor::{IdleProcessor, NativeProcessor, Processor, SyncProcessor, TimerProcessor};
pub use promise::{Promise, PromiseState, Rejecter, Resolver, SettlementId};
pub use runtime::{Runtime, UnhandledListener};
pub use task_queue::{Job, TimerId};
pub use unhandled::UnhandledRejection;
