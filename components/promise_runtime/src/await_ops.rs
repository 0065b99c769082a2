//! Await-style combinators.
//!
//! These accept any [`Value`] and treat plain values and thenables uniformly:
//! a plain value is handed to the callback synchronously, a thenable gets the
//! callback attached as a continuation. They work with thenables from any
//! source, not only runtime promises.

use crate::promise::Promise;
use core_types::{Completion, Handler, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Outcome delivered to a [`do_await_response`] callback.
#[derive(Debug, Clone, PartialEq)]
pub struct AwaitResponse {
    /// Fulfillment value, `Undefined` when rejected
    pub value: Value,
    /// Rejection reason, `Undefined` when resolved
    pub reason: Value,
    /// Whether the awaited value rejected
    pub rejected: bool,
}

impl AwaitResponse {
    /// A response for a fulfilled value.
    pub fn resolved(value: Value) -> Self {
        Self {
            value,
            reason: Value::Undefined,
            rejected: false,
        }
    }

    /// A response for a rejection.
    pub fn rejected(reason: Value) -> Self {
        Self {
            value: Value::Undefined,
            reason,
            rejected: true,
        }
    }
}

/// Waits for `value` and routes its outcome to the handlers.
///
/// For a thenable, the handlers are attached with `then` (when any is given)
/// and `on_finally` is composed on top; the chained thenable is returned.
///
/// For a plain value, `on_resolved` runs synchronously and its result is
/// returned (the value itself when there is no `on_resolved`). If it fails,
/// the error goes to `on_rejected` when given, and is returned as `Err`
/// otherwise. `on_finally` runs last.
///
/// # Examples
///
/// ```
/// use core_types::{Handler, Value};
/// use promise_runtime::do_await;
///
/// let doubled = do_await(
///     Value::Smi(4),
///     Some(Handler::infallible(|v| match v {
///         Value::Smi(n) => Value::Smi(n * 2),
///         other => other,
///     })),
///     None,
///     None,
/// );
/// assert_eq!(doubled, Ok(Value::Smi(8)));
/// ```
pub fn do_await(
    value: Value,
    on_resolved: Option<Handler>,
    on_rejected: Option<Handler>,
    on_finally: Option<Box<dyn FnOnce()>>,
) -> Completion {
    match value {
        Value::Thenable(thenable) => {
            let chained = if on_resolved.is_some() || on_rejected.is_some() {
                thenable.then(on_resolved, on_rejected)?
            } else {
                Value::Thenable(thenable)
            };
            match on_finally {
                Some(on_finally) => do_finally(chained, on_finally),
                None => Ok(chained),
            }
        }
        value => {
            let result = match on_resolved {
                Some(handler) => handler.call(value),
                None => Ok(value),
            };
            let result = match (result, on_rejected) {
                (Err(reason), Some(handler)) => handler.call(reason),
                (result, _) => result,
            };
            if let Some(on_finally) = on_finally {
                on_finally();
            }
            result
        }
    }
}

/// Waits for `value` and hands its outcome to a single callback.
///
/// Returns the callback's result for plain values, or the chained thenable.
pub fn do_await_response<F>(value: Value, callback: F) -> Completion
where
    F: FnOnce(AwaitResponse) -> Completion + 'static,
{
    match value {
        Value::Thenable(thenable) => {
            let on_resolved = Rc::new(RefCell::new(Some(callback)));
            let on_rejected = on_resolved.clone();
            thenable.then(
                Some(Handler::new(move |value| {
                    respond(&on_resolved, AwaitResponse::resolved(value))
                })),
                Some(Handler::new(move |reason| {
                    respond(&on_rejected, AwaitResponse::rejected(reason))
                })),
            )
        }
        value => callback(AwaitResponse::resolved(value)),
    }
}

fn respond<F>(cell: &RefCell<Option<F>>, response: AwaitResponse) -> Completion
where
    F: FnOnce(AwaitResponse) -> Completion,
{
    let callback = cell.borrow_mut().take();
    match callback {
        Some(callback) => callback(response),
        None => Ok(Value::Undefined),
    }
}

/// Runs `on_finally` once `value` settles, passing the outcome through.
///
/// Runtime promises use their own `finally`. Other thenables get the same
/// behavior through `then` with pass-through wrappers on both sides. Plain
/// values run `on_finally` immediately.
pub fn do_finally<F>(value: Value, on_finally: F) -> Completion
where
    F: FnOnce() + 'static,
{
    if let Some(promise) = Promise::from_value(&value) {
        let derived = promise.finally(move || {
            on_finally();
            Ok(())
        });
        return Ok(derived.into());
    }
    match value {
        Value::Thenable(thenable) => {
            let on_resolved = Rc::new(RefCell::new(Some(on_finally)));
            let on_rejected = on_resolved.clone();
            thenable.then(
                Some(Handler::new(move |value| {
                    run_once(&on_resolved);
                    Ok(value)
                })),
                Some(Handler::new(move |reason| {
                    run_once(&on_rejected);
                    Err(reason)
                })),
            )
        }
        value => {
            on_finally();
            Ok(value)
        }
    }
}

fn run_once<F: FnOnce()>(cell: &RefCell<Option<F>>) {
    let on_finally = cell.borrow_mut().take();
    if let Some(on_finally) = on_finally {
        on_finally();
    }
}
