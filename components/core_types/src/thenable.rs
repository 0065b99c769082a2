//! The thenable capability and continuation handlers.
//!
//! Anything exposing a `then`-shaped method is a [`Thenable`]. Values holding
//! one are tagged [`Value::Thenable`](crate::Value::Thenable) so that every
//! combinator can branch on "plain value or deferred value" without runtime
//! type inspection.

use crate::Value;
use std::any::Any;
use std::fmt;

/// Outcome of running a handler: `Ok` is a returned value, `Err` a thrown one.
pub type Completion = Result<Value, Value>;

/// A one-shot continuation handler registered through `then`.
///
/// Handlers are `FnOnce`: for any given reaction at most one of the resolve and
/// reject handlers is ever invoked.
pub struct Handler {
    callback: Box<dyn FnOnce(Value) -> Completion>,
}

impl Handler {
    /// Creates a new Handler from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Value) -> Completion + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Creates a handler that always succeeds with the closure's value.
    pub fn infallible<F>(f: F) -> Self
    where
        F: FnOnce(Value) -> Value + 'static,
    {
        Self::new(move |value| Ok(f(value)))
    }

    /// Calls the handler with the settled value.
    pub fn call(self, value: Value) -> Completion {
        (self.callback)(value)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler {{ ... }}")
    }
}

/// A value exposing a `then`-like method.
///
/// Implementors must invoke at most one of the two handlers, at most once.
/// The returned completion is the chained value (usually another thenable);
/// `Err` means calling `then` itself failed.
pub trait Thenable {
    /// Registers continuations and returns the chained value.
    fn then(&self, on_resolved: Option<Handler>, on_rejected: Option<Handler>) -> Completion;

    /// Allows runtimes to recognise their own thenables.
    fn as_any(&self) -> &dyn Any;
}
