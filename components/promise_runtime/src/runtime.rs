//! The runtime ties a host event loop to runtime-wide promise settings.
//!
//! It owns the settlement id counter, the stack of settlements currently
//! executing (used to give new settlements a parent), the swappable default
//! flavor, the unhandled-rejection listener and the debug switch.

use crate::config::{FlavorKind, RuntimeConfig};
use crate::debug::{DebugEvent, DebugLogger, DebugState};
use crate::event_loop::EventLoop;
use crate::flavor::Flavor;
use crate::promise::{Promise, Rejecter, Resolver, SettlementId};
use crate::unhandled::UnhandledRejection;
use core_types::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Receives rejections that stayed unobserved for the grace period.
pub type UnhandledListener = Rc<dyn Fn(&UnhandledRejection)>;

struct RuntimeInner {
    event_loop: EventLoop,
    initial: RuntimeConfig,
    settings: RefCell<RuntimeConfig>,
    next_id: Cell<SettlementId>,
    chain: RefCell<Vec<SettlementId>>,
    debug: RefCell<DebugState>,
    unhandled_listener: RefCell<Option<UnhandledListener>>,
}

/// Shared runtime state. Clones refer to the same runtime.
///
/// # Examples
///
/// ```
/// use core_types::Value;
/// use promise_runtime::{EventLoop, FlavorKind, Runtime};
///
/// let runtime = Runtime::with_event_loop(EventLoop::with_virtual_clock());
/// runtime.set_create_promise_impl(FlavorKind::Sync);
///
/// let promise = runtime.create_all_promise(vec![Value::Smi(1), Value::Smi(2)]);
/// assert_eq!(promise.flavor_kind(), FlavorKind::Sync);
/// assert_eq!(promise.outcome(), Some(Ok(Value::Array(vec![Value::Smi(1), Value::Smi(2)]))));
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Pops the settlement chain when dropped.
pub(crate) struct ChainGuard {
    runtime: Runtime,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        self.runtime.inner.chain.borrow_mut().pop();
    }
}

impl Runtime {
    /// Creates a runtime on the wall-clock event loop with default settings.
    pub fn new() -> Self {
        Self::with_config(EventLoop::new(), RuntimeConfig::default())
    }

    /// Creates a runtime on the given event loop with default settings.
    pub fn with_event_loop(event_loop: EventLoop) -> Self {
        Self::with_config(event_loop, RuntimeConfig::default())
    }

    /// Creates a runtime on the given event loop and settings.
    pub fn with_config(event_loop: EventLoop, config: RuntimeConfig) -> Self {
        tracing::debug!(
            event = "runtime.init",
            default_flavor = %config.default_flavor,
            microtasks = event_loop.supports_microtasks(),
            idle = event_loop.supports_idle(),
            "Promise runtime created"
        );
        let debug = DebugState {
            enabled: config.debug,
            logger: None,
        };
        Self {
            inner: Rc::new(RuntimeInner {
                event_loop,
                initial: config.clone(),
                settings: RefCell::new(config),
                next_id: Cell::new(0),
                chain: RefCell::new(Vec::new()),
                debug: RefCell::new(debug),
                unhandled_listener: RefCell::new(None),
            }),
        }
    }

    /// The host event loop.
    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.event_loop
    }

    /// Current host time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.inner.event_loop.now_ms()
    }

    /// Snapshot of the current settings.
    pub fn config(&self) -> RuntimeConfig {
        self.inner.settings.borrow().clone()
    }

    /// Drives the event loop until no work remains.
    pub fn run_until_idle(&self) -> usize {
        self.inner.event_loop.run_until_idle()
    }

    /// Drives the event loop for `duration_ms` of host time.
    pub fn run_for(&self, duration_ms: u64) -> usize {
        self.inner.event_loop.run_for(duration_ms)
    }

    // --- flavors ---

    /// The synchronous flavor.
    pub fn sync(&self) -> Flavor {
        Flavor::sync(self)
    }

    /// The timer flavor. `delay_ms` defaults to the configured async delay.
    pub fn asynchronous(&self, delay_ms: Option<u64>) -> Flavor {
        let delay_ms = delay_ms.unwrap_or_else(|| self.inner.settings.borrow().async_delay_ms);
        Flavor::asynchronous(self, delay_ms)
    }

    /// The idle flavor. Without `timeout_ms` the runtime default applies.
    pub fn idle(&self, timeout_ms: Option<u64>) -> Flavor {
        Flavor::idle(self, timeout_ms)
    }

    /// The native flavor.
    pub fn native(&self) -> Flavor {
        Flavor::native(self)
    }

    /// The flavor for `kind` with default arguments.
    pub fn flavor(&self, kind: FlavorKind) -> Flavor {
        match kind {
            FlavorKind::Sync => self.sync(),
            FlavorKind::Async => self.asynchronous(None),
            FlavorKind::Idle => self.idle(None),
            FlavorKind::Native => self.native(),
        }
    }

    /// The flavor behind the generic `create_*_promise` helpers.
    ///
    /// A native default on a host without microtasks resolves to the timer
    /// flavor.
    pub fn default_flavor(&self) -> Flavor {
        let kind = self.inner.settings.borrow().default_flavor;
        if kind == FlavorKind::Native && !self.inner.event_loop.supports_microtasks() {
            return self.asynchronous(None);
        }
        self.flavor(kind)
    }

    /// Swaps the flavor behind the generic helpers.
    pub fn set_create_promise_impl(&self, kind: FlavorKind) {
        tracing::debug!(event = "runtime.default_flavor.set", flavor = %kind, "Default flavor changed");
        self.inner.settings.borrow_mut().default_flavor = kind;
    }

    /// Restores the default flavor the runtime was created with.
    pub fn reset_create_promise_impl(&self) {
        let kind = self.inner.initial.default_flavor;
        self.set_create_promise_impl(kind);
    }

    /// Sets the deadline hint used by idle flavors created without one.
    pub fn set_default_idle_timeout(&self, timeout_ms: Option<u64>) {
        self.inner.settings.borrow_mut().idle_timeout_ms = timeout_ms;
    }

    /// The idle deadline hint used when a flavor has none.
    pub fn default_idle_timeout(&self) -> Option<u64> {
        self.inner.settings.borrow().idle_timeout_ms
    }

    /// Sets how long a rejection may stay unobserved before it is reported.
    pub fn set_unhandled_grace_period(&self, grace_ms: u64) {
        self.inner.settings.borrow_mut().unhandled_grace_ms = grace_ms;
    }

    /// Current unhandled-rejection grace period.
    pub fn unhandled_grace_ms(&self) -> u64 {
        self.inner.settings.borrow().unhandled_grace_ms
    }

    /// Stale-task ceiling new schedulers start with.
    pub fn stale_timeout_ms(&self) -> u64 {
        self.inner.settings.borrow().stale_timeout_ms
    }

    // --- diagnostics ---

    /// Registers the unhandled-rejection listener, replacing any previous one.
    pub fn on_unhandled_rejection<F>(&self, listener: F)
    where
        F: Fn(&UnhandledRejection) + 'static,
    {
        *self.inner.unhandled_listener.borrow_mut() = Some(Rc::new(listener));
    }

    /// Removes the listener; reports go to the log again.
    pub fn clear_unhandled_listener(&self) {
        self.inner.unhandled_listener.borrow_mut().take();
    }

    /// Enables or disables promise debugging.
    ///
    /// With no logger, transitions are logged at debug level.
    pub fn set_promise_debug_state(&self, enabled: bool, logger: Option<DebugLogger>) {
        *self.inner.debug.borrow_mut() = DebugState { enabled, logger };
    }

    /// Returns true while promise debugging is enabled.
    pub fn is_debug_enabled(&self) -> bool {
        self.inner.debug.borrow().enabled
    }

    pub(crate) fn log_transition(&self, event: &DebugEvent) {
        let debug = self.inner.debug.borrow().clone();
        if debug.enabled {
            debug.emit(event);
        }
    }

    pub(crate) fn notify_unhandled(&self, rejection: &UnhandledRejection) {
        let listener = self.inner.unhandled_listener.borrow().clone();
        match listener {
            Some(listener) => listener(rejection),
            None => tracing::warn!(
                event = "promise.unhandled_rejection",
                id = rejection.promise.id(),
                flavor = %rejection.promise.flavor_kind(),
                reason = %rejection.reason,
                "Unhandled promise rejection"
            ),
        }
    }

    // --- settlement identity ---

    pub(crate) fn next_settlement_id(&self) -> SettlementId {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        id
    }

    pub(crate) fn current_settlement(&self) -> Option<SettlementId> {
        self.inner.chain.borrow().last().copied()
    }

    pub(crate) fn enter_settlement(&self, id: SettlementId) -> ChainGuard {
        self.inner.chain.borrow_mut().push(id);
        ChainGuard {
            runtime: self.clone(),
        }
    }

    // --- generic helpers bound to the default flavor ---

    /// Creates a promise of the default flavor.
    pub fn create_promise<F>(&self, executor: F) -> Promise
    where
        F: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
    {
        self.default_flavor().create(executor)
    }

    /// `all` on the default flavor.
    pub fn create_all_promise(&self, inputs: Vec<Value>) -> Promise {
        self.default_flavor().all(inputs)
    }

    /// `all_settled` on the default flavor.
    pub fn create_all_settled_promise(&self, inputs: Vec<Value>) -> Promise {
        self.default_flavor().all_settled(inputs)
    }

    /// `resolved` on the default flavor.
    pub fn create_resolved_promise(&self, value: impl Into<Value>) -> Promise {
        self.default_flavor().resolved(value)
    }

    /// `rejected` on the default flavor.
    pub fn create_rejected_promise(&self, reason: impl Into<Value>) -> Promise {
        self.default_flavor().rejected(reason)
    }

    /// `race` on the default flavor.
    pub fn create_race_promise(&self, inputs: Vec<Value>) -> Promise {
        self.default_flavor().race(inputs)
    }

    /// `any` on the default flavor.
    pub fn create_any_promise(&self, inputs: Vec<Value>) -> Promise {
        self.default_flavor().any(inputs)
    }

    /// `timeout` on the default flavor.
    pub fn create_timeout_promise(&self, ms: u64, resolve_with: Option<Value>) -> Promise {
        self.default_flavor().timeout(ms, resolve_with)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("event_loop", &self.inner.event_loop)
            .field("settings", &*self.inner.settings.borrow())
            .field("settlements", &self.inner.next_id.get())
            .finish()
    }
}
