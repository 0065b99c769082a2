//! The settlement state machine behind every deferred value.
//!
//! A [`Promise`] is a handle to one settlement. It moves from `Pending` to
//! exactly one of `Resolved` or `Rejected`, optionally passing through
//! `Resolving` while it follows another thenable. Reactions attached with
//! [`Promise::then`] are queued until settlement and then handed, as one batch,
//! to the processor of the promise's [`Flavor`].
//!
//! Ownership only flows forward: a settlement owns its queued reactions, and a
//! reaction owns the [`Resolver`]/[`Rejecter`] of the promise it feeds. A
//! reaction receives the settled outcome by value when it runs, so a derived
//! promise never holds its parent.

use crate::debug::{DebugEvent, PromiseDebugInfo};
use crate::flavor::Flavor;
use crate::config::FlavorKind;
use crate::runtime::Runtime;
use crate::task_queue::{Job, TimerId};
use crate::unhandled;
use core_types::{Completion, Handler, JsError, Thenable, Value};
use serde::Serialize;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Monotonically increasing settlement identifier, unique per runtime.
pub type SettlementId = u64;

/// The state of a settlement.
///
/// Once `Resolved` or `Rejected` the state and value never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromiseState {
    /// Not yet resolved or rejected.
    Pending,
    /// Resolved with a thenable and waiting for it to settle.
    Resolving,
    /// Fulfilled with a value.
    Resolved,
    /// Rejected with a reason.
    Rejected,
}

impl PromiseState {
    /// Returns the diagnostic name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            PromiseState::Pending => "pending",
            PromiseState::Resolving => "resolving",
            PromiseState::Resolved => "resolved",
            PromiseState::Rejected => "rejected",
        }
    }

    /// Returns true for `Resolved` and `Rejected`.
    pub fn is_settled(self) -> bool {
        matches!(self, PromiseState::Resolved | PromiseState::Rejected)
    }
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Reaction = Box<dyn FnOnce(Completion)>;

struct Settlement {
    id: SettlementId,
    parent: Option<SettlementId>,
    state: PromiseState,
    value: Option<Value>,
    reactions: Vec<Reaction>,
    handled: bool,
    unhandled_timer: Option<TimerId>,
    flavor: Flavor,
}

impl Settlement {
    fn debug_event(&self, from: PromiseState) -> Option<DebugEvent> {
        if !self.flavor.runtime().is_debug_enabled() {
            return None;
        }
        Some(DebugEvent {
            id: self.id,
            parent: self.parent,
            flavor: self.flavor.kind(),
            from,
            to: self.state,
            detail: self.value.as_ref().map(|v| v.to_string()),
            handled: self.handled,
        })
    }
}

/// A deferred value.
///
/// `Promise` is a cheap handle: clones refer to the same settlement.
///
/// # Examples
///
/// ```
/// use core_types::Value;
/// use promise_runtime::{PromiseState, Runtime};
///
/// let runtime = Runtime::with_event_loop(promise_runtime::EventLoop::with_virtual_clock());
/// let promise = runtime.sync().create(|resolve, _reject| {
///     resolve.resolve(21);
///     Ok(())
/// });
///
/// let doubled = promise.and_then(|v| match v {
///     Value::Smi(n) => Ok(Value::Smi(n * 2)),
///     other => Err(other),
/// });
/// assert_eq!(doubled.state(), PromiseState::Resolved);
/// assert_eq!(doubled.outcome(), Some(Ok(Value::Smi(42))));
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<Settlement>>,
}

impl Promise {
    pub(crate) fn pending(flavor: &Flavor, parent: Option<SettlementId>) -> Promise {
        let id = flavor.runtime().next_settlement_id();
        tracing::trace!(
            event = "promise.create",
            id,
            parent = ?parent,
            flavor = %flavor.kind(),
            "Settlement created"
        );
        Promise {
            inner: Rc::new(RefCell::new(Settlement {
                id,
                parent,
                state: PromiseState::Pending,
                value: None,
                reactions: Vec::new(),
                handled: false,
                unhandled_timer: None,
                flavor: flavor.clone(),
            })),
        }
    }

    /// Constructs a settlement and runs `executor` synchronously, exactly once.
    ///
    /// An `Err` returned by the executor rejects the promise unless it already
    /// settled.
    pub(crate) fn with_executor<F>(flavor: &Flavor, executor: F) -> Promise
    where
        F: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
    {
        let runtime = flavor.runtime().clone();
        let promise = Promise::pending(flavor, runtime.current_settlement());
        let (resolver, rejecter) = promise.transition_fns(PromiseState::Pending);
        let fallback = rejecter.clone();
        let outcome = {
            let _chain = runtime.enter_settlement(promise.id());
            executor(resolver, rejecter)
        };
        if let Err(reason) = outcome {
            fallback.reject(reason);
        }
        promise
    }

    fn transition_fns(&self, allowed: PromiseState) -> (Resolver, Rejecter) {
        (
            Resolver {
                promise: self.clone(),
                allowed,
            },
            Rejecter {
                promise: self.clone(),
                allowed,
            },
        )
    }

    /// The settlement id.
    pub fn id(&self) -> SettlementId {
        self.inner.borrow().id
    }

    /// The settlement that was being resolved when this one was created.
    pub fn parent_id(&self) -> Option<SettlementId> {
        self.inner.borrow().parent
    }

    /// Current state.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state
    }

    /// Returns true once resolved or rejected.
    pub fn is_settled(&self) -> bool {
        self.state().is_settled()
    }

    /// Settled outcome without attaching a continuation.
    ///
    /// Reading a rejection this way never counts as handling it.
    pub fn outcome(&self) -> Option<Completion> {
        let settlement = self.inner.borrow();
        match (settlement.state, &settlement.value) {
            (PromiseState::Resolved, Some(value)) => Some(Ok(value.clone())),
            (PromiseState::Rejected, Some(reason)) => Some(Err(reason.clone())),
            _ => None,
        }
    }

    /// The flavor this promise (and every promise derived from it) uses.
    pub fn flavor(&self) -> Flavor {
        self.inner.borrow().flavor.clone()
    }

    /// Shorthand for `flavor().kind()`.
    pub fn flavor_kind(&self) -> FlavorKind {
        self.inner.borrow().flavor.kind()
    }

    /// The runtime this promise belongs to.
    pub fn runtime(&self) -> Runtime {
        self.inner.borrow().flavor.runtime().clone()
    }

    /// Returns true if both handles refer to the same settlement.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Recovers the promise handle from a value produced by `Value::from(promise)`.
    pub fn from_value(value: &Value) -> Option<Promise> {
        value
            .as_thenable()
            .and_then(|t| t.as_any().downcast_ref::<Promise>())
            .cloned()
    }

    /// Internal state, available only while promise debugging is enabled.
    pub fn debug_info(&self) -> Option<PromiseDebugInfo> {
        let settlement = self.inner.borrow();
        if !settlement.flavor.runtime().is_debug_enabled() {
            return None;
        }
        Some(PromiseDebugInfo {
            id: settlement.id,
            parent: settlement.parent,
            flavor: settlement.flavor.kind(),
            state: settlement.state,
            result: settlement.value.clone(),
            handled: settlement.handled,
            pending_reactions: settlement.reactions.len(),
        })
    }

    /// Attaches continuations and returns the derived promise.
    ///
    /// The derived promise has the same flavor. A missing handler passes the
    /// outcome through unchanged; a handler returning `Err` rejects the
    /// derived promise; a handler returning a thenable makes the derived
    /// promise follow it. A panicking handler rejects the derived promise
    /// with an `InternalError`.
    pub fn then(&self, on_resolved: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let flavor = self.flavor();
        let runtime = flavor.runtime().clone();
        let derived = Promise::pending(&flavor, Some(self.id()));
        let derived_id = derived.id();
        let (resolver, rejecter) = derived.transition_fns(PromiseState::Pending);

        self.add_reaction(Box::new(move |outcome| {
            let _chain = runtime.enter_settlement(derived_id);
            let result = match outcome {
                Ok(value) => match on_resolved {
                    Some(handler) => call_contained(handler, value),
                    None => Ok(value),
                },
                Err(reason) => match on_rejected {
                    Some(handler) => call_contained(handler, reason),
                    None => Err(reason),
                },
            };
            match result {
                Ok(value) => resolver.resolve(value),
                Err(reason) => rejecter.reject(reason),
            }
        }));
        derived
    }

    /// `then` with only a fulfillment handler.
    pub fn and_then<F>(&self, on_resolved: F) -> Promise
    where
        F: FnOnce(Value) -> Completion + 'static,
    {
        self.then(Some(Handler::new(on_resolved)), None)
    }

    /// `then` with only a rejection handler.
    pub fn catch<F>(&self, on_rejected: F) -> Promise
    where
        F: FnOnce(Value) -> Completion + 'static,
    {
        self.then(None, Some(Handler::new(on_rejected)))
    }

    /// Runs `on_finally` on either outcome and passes the outcome through.
    ///
    /// If `on_finally` fails, its error becomes the derived promise's rejection.
    pub fn finally<F>(&self, on_finally: F) -> Promise
    where
        F: FnOnce() -> Result<(), Value> + 'static,
    {
        let on_resolved = Rc::new(RefCell::new(Some(on_finally)));
        let on_rejected = on_resolved.clone();
        self.then(
            Some(Handler::new(move |value| {
                run_finally(&on_resolved)?;
                Ok(value)
            })),
            Some(Handler::new(move |reason| {
                run_finally(&on_rejected)?;
                Err(reason)
            })),
        )
    }

    fn settle(&self, allowed: PromiseState, outcome: Completion) {
        let current = self.state();
        if current != allowed {
            tracing::trace!(
                event = "promise.settle.ignored",
                id = self.id(),
                state = %current,
                "Settlement already decided"
            );
            return;
        }
        match outcome {
            Ok(Value::Thenable(thenable)) => self.follow(thenable),
            outcome => self.finalize(outcome),
        }
    }

    fn follow(&self, thenable: Rc<dyn Thenable>) {
        let is_self = thenable
            .as_any()
            .downcast_ref::<Promise>()
            .is_some_and(|inner| inner.ptr_eq(self));
        if is_self {
            let error = JsError::type_error(format!("Chaining cycle detected for promise #{}", self.id()));
            self.finalize(Err(error.into()));
            return;
        }

        let event = {
            let mut settlement = self.inner.borrow_mut();
            let from = settlement.state;
            settlement.state = PromiseState::Resolving;
            settlement.debug_event(from)
        };
        self.emit(event);

        // The thenable may call both handlers, or fail after calling one.
        // Only the first of those counts, even while a resolution with another
        // thenable keeps the state at `Resolving`.
        let called = Rc::new(Cell::new(false));
        let (resolver, rejecter) = self.transition_fns(PromiseState::Resolving);
        let on_failure = rejecter.clone();
        let (on_value, on_reason, on_error) = (called.clone(), called.clone(), called);
        let subscribed = thenable.then(
            Some(Handler::infallible(move |value| {
                if !on_value.replace(true) {
                    resolver.resolve(value);
                }
                Value::Undefined
            })),
            Some(Handler::infallible(move |reason| {
                if !on_reason.replace(true) {
                    rejecter.reject(reason);
                }
                Value::Undefined
            })),
        );
        if let Err(reason) = subscribed {
            if !on_error.replace(true) {
                on_failure.reject(reason);
            }
        }
    }

    fn finalize(&self, outcome: Completion) {
        let (state, value) = match &outcome {
            Ok(value) => (PromiseState::Resolved, value.clone()),
            Err(reason) => (PromiseState::Rejected, reason.clone()),
        };
        let (reactions, flavor, unobserved, event) = {
            let mut settlement = self.inner.borrow_mut();
            let from = settlement.state;
            settlement.state = state;
            settlement.value = Some(value);
            let event = settlement.debug_event(from);
            (
                std::mem::take(&mut settlement.reactions),
                settlement.flavor.clone(),
                state == PromiseState::Rejected && !settlement.handled,
                event,
            )
        };
        tracing::trace!(
            event = "promise.settle",
            id = self.id(),
            state = %state,
            reactions = reactions.len(),
            "Settlement finalized"
        );
        self.emit(event);

        if !reactions.is_empty() {
            let batch: Vec<Job> = reactions
                .into_iter()
                .map(|reaction| {
                    let outcome = outcome.clone();
                    Box::new(move || reaction(outcome)) as Job
                })
                .collect();
            flavor.dispatch(batch);
        }
        if unobserved {
            unhandled::track(self);
        }
    }

    fn add_reaction(&self, reaction: Reaction) {
        let (settled, timer, flavor) = {
            let mut settlement = self.inner.borrow_mut();
            settlement.handled = true;
            let timer = settlement.unhandled_timer.take();
            let settled = match (settlement.state, &settlement.value) {
                (PromiseState::Resolved, Some(value)) => Some(Ok(value.clone())),
                (PromiseState::Rejected, Some(reason)) => Some(Err(reason.clone())),
                _ => None,
            };
            (settled, timer, settlement.flavor.clone())
        };
        if let Some(timer) = timer {
            unhandled::cancel(flavor.runtime(), self.id(), timer);
        }
        match settled {
            Some(outcome) => flavor.dispatch(vec![Box::new(move || reaction(outcome))]),
            None => self.inner.borrow_mut().reactions.push(reaction),
        }
    }

    fn emit(&self, event: Option<DebugEvent>) {
        if let Some(event) = event {
            let runtime = self.runtime();
            runtime.log_transition(&event);
        }
    }

    pub(crate) fn is_handled(&self) -> bool {
        self.inner.borrow().handled
    }

    pub(crate) fn set_unhandled_timer(&self, timer: TimerId) {
        self.inner.borrow_mut().unhandled_timer = Some(timer);
    }

    pub(crate) fn clear_unhandled_timer(&self) {
        self.inner.borrow_mut().unhandled_timer = None;
    }
}

fn call_contained(handler: Handler, argument: Value) -> Completion {
    panic::catch_unwind(AssertUnwindSafe(move || handler.call(argument)))
        .unwrap_or_else(|payload| Err(JsError::from_panic(payload.as_ref()).into()))
}

fn run_finally<F>(cell: &RefCell<Option<F>>) -> Result<(), Value>
where
    F: FnOnce() -> Result<(), Value>,
{
    let on_finally = cell.borrow_mut().take();
    match on_finally {
        Some(f) => f(),
        None => Ok(()),
    }
}

impl Thenable for Promise {
    fn then(&self, on_resolved: Option<Handler>, on_rejected: Option<Handler>) -> Completion {
        Ok(Value::from(Promise::then(self, on_resolved, on_rejected)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Promise> for Value {
    fn from(promise: Promise) -> Self {
        Value::Thenable(Rc::new(promise))
    }
}

impl fmt::Display for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(settlement) = self.inner.try_borrow() else {
            return write!(f, "[Promise <busy>]");
        };
        write!(
            f,
            "[{} Promise #{}] {}",
            settlement.flavor.kind(),
            settlement.id,
            settlement.state
        )?;
        if let Some(value) = &settlement.value {
            write!(f, ": {}", value)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(settlement) => f
                .debug_struct("Promise")
                .field("id", &settlement.id)
                .field("flavor", &settlement.flavor.kind())
                .field("state", &settlement.state)
                .field("value", &settlement.value)
                .finish(),
            Err(_) => write!(f, "Promise {{ <busy> }}"),
        }
    }
}

/// Resolves the promise it was created for.
///
/// Only effective while the promise is still in the state the resolver was
/// created for; every later call is ignored.
#[derive(Clone)]
pub struct Resolver {
    promise: Promise,
    allowed: PromiseState,
}

impl Resolver {
    /// Resolves with `value`; a thenable value is followed.
    pub fn resolve(&self, value: impl Into<Value>) {
        self.promise.settle(self.allowed, Ok(value.into()));
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolver {{ promise: {} }}", self.promise)
    }
}

/// Rejects the promise it was created for.
#[derive(Clone)]
pub struct Rejecter {
    promise: Promise,
    allowed: PromiseState,
}

impl Rejecter {
    /// Rejects with `reason`. Thenable reasons are stored as-is.
    pub fn reject(&self, reason: impl Into<Value>) {
        let reason = reason.into();
        let current = self.promise.state();
        if current != self.allowed {
            tracing::trace!(
                event = "promise.settle.ignored",
                id = self.promise.id(),
                state = %current,
                "Settlement already decided"
            );
            return;
        }
        self.promise.finalize(Err(reason));
    }
}

impl fmt::Debug for Rejecter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rejecter {{ promise: {} }}", self.promise)
    }
}
