//! Promise flavors.
//!
//! A [`Flavor`] binds a processor to a runtime and acts as the factory for
//! promises of that flavor. Every promise derived from a promise (through
//! `then`, `catch`, `finally` or a combinator called on the flavor) shares the
//! original's flavor.

use crate::config::FlavorKind;
use crate::processor::{IdleProcessor, NativeProcessor, Processor, SyncProcessor, TimerProcessor};
use crate::promise::{Promise, Rejecter, Resolver};
use crate::runtime::Runtime;
use crate::task_queue::Job;
use core_types::Value;
use std::fmt;
use std::rc::Rc;

struct FlavorInner {
    kind: FlavorKind,
    processor: Box<dyn Processor>,
    runtime: Runtime,
}

/// A deferral strategy plus the runtime it schedules on.
///
/// # Examples
///
/// ```
/// use promise_runtime::{EventLoop, PromiseState, Runtime};
///
/// let runtime = Runtime::with_event_loop(EventLoop::with_virtual_clock());
/// let flavor = runtime.asynchronous(Some(50));
/// let promise = flavor.resolved(1).and_then(Ok);
///
/// runtime.run_for(49);
/// assert_eq!(promise.state(), PromiseState::Pending);
/// runtime.run_for(1);
/// assert_eq!(promise.state(), PromiseState::Resolved);
/// ```
#[derive(Clone)]
pub struct Flavor {
    inner: Rc<FlavorInner>,
}

impl Flavor {
    /// Creates a flavor from an arbitrary processor.
    pub fn new(runtime: &Runtime, kind: FlavorKind, processor: Box<dyn Processor>) -> Self {
        Self {
            inner: Rc::new(FlavorInner {
                kind,
                processor,
                runtime: runtime.clone(),
            }),
        }
    }

    /// Continuations run inside the settling call.
    pub fn sync(runtime: &Runtime) -> Self {
        Self::new(runtime, FlavorKind::Sync, Box::new(SyncProcessor))
    }

    /// Continuations run from a timer `delay_ms` after settlement.
    pub fn asynchronous(runtime: &Runtime, delay_ms: u64) -> Self {
        Self::new(runtime, FlavorKind::Async, Box::new(TimerProcessor::new(delay_ms)))
    }

    /// Continuations run when the host is idle or `timeout_ms` elapses.
    pub fn idle(runtime: &Runtime, timeout_ms: Option<u64>) -> Self {
        Self::new(runtime, FlavorKind::Idle, Box::new(IdleProcessor::new(timeout_ms)))
    }

    /// Continuations run on the host's microtask queue.
    pub fn native(runtime: &Runtime) -> Self {
        Self::new(runtime, FlavorKind::Native, Box::new(NativeProcessor))
    }

    /// The flavor's kind.
    pub fn kind(&self) -> FlavorKind {
        self.inner.kind
    }

    /// The runtime this flavor schedules on.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Name of the underlying processor.
    pub fn processor_name(&self) -> &'static str {
        self.inner.processor.name()
    }

    pub(crate) fn dispatch(&self, batch: Vec<Job>) {
        if batch.is_empty() {
            return;
        }
        self.inner.processor.process(&self.inner.runtime, batch);
    }

    /// Creates a promise and runs `executor` synchronously.
    ///
    /// Returning `Err` from the executor rejects the promise, unless it was
    /// already resolved or rejected.
    pub fn create<F>(&self, executor: F) -> Promise
    where
        F: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
    {
        Promise::with_executor(self, executor)
    }

    /// A promise resolved with `value`.
    ///
    /// A value that already holds a runtime promise is returned unchanged;
    /// foreign thenables are followed.
    pub fn resolved(&self, value: impl Into<Value>) -> Promise {
        let value = value.into();
        if let Some(promise) = Promise::from_value(&value) {
            return promise;
        }
        self.create(move |resolve, _| {
            resolve.resolve(value);
            Ok(())
        })
    }

    /// A promise rejected with `reason`.
    pub fn rejected(&self, reason: impl Into<Value>) -> Promise {
        let reason = reason.into();
        self.create(move |_, reject| {
            reject.reject(reason);
            Ok(())
        })
    }
}

impl fmt::Debug for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flavor")
            .field("kind", &self.inner.kind)
            .field("processor", &self.inner.processor.name())
            .finish()
    }
}

/// Creates a promise whose continuations run synchronously.
pub fn create_sync_promise<F>(runtime: &Runtime, executor: F) -> Promise
where
    F: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
{
    runtime.sync().create(executor)
}

/// Creates a promise whose continuations run from a timer.
///
/// `delay_ms` defaults to the runtime's configured async delay.
pub fn create_async_promise<F>(runtime: &Runtime, executor: F, delay_ms: Option<u64>) -> Promise
where
    F: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
{
    runtime.asynchronous(delay_ms).create(executor)
}

/// Creates a promise whose continuations run when the host is idle.
pub fn create_idle_promise<F>(runtime: &Runtime, executor: F, timeout_ms: Option<u64>) -> Promise
where
    F: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
{
    runtime.idle(timeout_ms).create(executor)
}

/// Creates a promise on the host's native job queue.
pub fn create_native_promise<F>(runtime: &Runtime, executor: F) -> Promise
where
    F: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
{
    runtime.native().create(executor)
}
