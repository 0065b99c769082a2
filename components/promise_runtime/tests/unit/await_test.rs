//! Unit tests for do_await, do_await_response and do_finally

use super::virtual_runtime;
use core_types::{Completion, Handler, Thenable, Value};
use promise_runtime::{do_await, do_await_response, do_finally, AwaitResponse, FlavorKind, Promise};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// A foreign thenable that rejects synchronously inside `then`.
struct Refuse(Value);

impl Thenable for Refuse {
    fn then(&self, _on_resolved: Option<Handler>, on_rejected: Option<Handler>) -> Completion {
        match on_rejected {
            Some(handler) => handler.call(self.0.clone()),
            None => Err(self.0.clone()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn log_into(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> Box<dyn FnOnce()> {
    let log = log.clone();
    Box::new(move || log.borrow_mut().push(label.to_string()))
}

#[test]
fn do_await_on_promise_returns_chained_promise() {
    let rt = virtual_runtime();
    let source = rt.asynchronous(None).timeout(10, Some(Value::Smi(20)));
    let result = do_await(
        source.into(),
        Some(Handler::infallible(|v| match v {
            Value::Smi(n) => Value::Smi(n + 1),
            other => other,
        })),
        None,
        None,
    )
    .unwrap();

    let chained = Promise::from_value(&result).unwrap();
    assert_eq!(chained.flavor_kind(), FlavorKind::Async);
    rt.run_until_idle();
    assert_eq!(chained.outcome(), Some(Ok(Value::Smi(21))));
}

#[test]
fn do_await_finally_runs_after_handler() {
    let rt = virtual_runtime();
    let log = Rc::new(RefCell::new(vec![]));
    let l = log.clone();
    let source = rt.asynchronous(None).rejected("nope");
    let result = do_await(
        source.into(),
        None,
        Some(Handler::infallible(move |reason| {
            l.borrow_mut().push(format!("rejected {}", reason));
            Value::from("recovered")
        })),
        Some(log_into(&log, "finally")),
    )
    .unwrap();

    rt.run_until_idle();
    assert_eq!(*log.borrow(), vec!["rejected nope".to_string(), "finally".to_string()]);
    let chained = Promise::from_value(&result).unwrap();
    assert_eq!(chained.outcome(), Some(Ok(Value::from("recovered"))));
}

#[test]
fn do_await_plain_value_is_synchronous() {
    let log = Rc::new(RefCell::new(vec![]));
    let l = log.clone();
    let result = do_await(
        Value::from("now"),
        Some(Handler::infallible(move |v| {
            l.borrow_mut().push(format!("resolved {}", v));
            Value::Boolean(true)
        })),
        None,
        Some(log_into(&log, "finally")),
    );

    assert_eq!(result, Ok(Value::Boolean(true)));
    assert_eq!(*log.borrow(), vec!["resolved now".to_string(), "finally".to_string()]);
}

#[test]
fn do_await_without_handlers_keeps_thenable() {
    let rt = virtual_runtime();
    let source = rt.sync().resolved(1);
    let result = do_await(source.clone().into(), None, None, None).unwrap();
    assert!(Promise::from_value(&result).unwrap().ptr_eq(&source));
}

#[test]
fn do_await_response_reports_rejection() {
    let rt = virtual_runtime();
    let seen: Rc<RefCell<Option<AwaitResponse>>> = Rc::new(RefCell::new(None));
    let s = seen.clone();
    let source = rt.asynchronous(None).rejected("why");
    do_await_response(source.into(), move |response| {
        *s.borrow_mut() = Some(response);
        Ok(Value::Undefined)
    })
    .unwrap();

    rt.run_until_idle();
    assert_eq!(*seen.borrow(), Some(AwaitResponse::rejected(Value::from("why"))));
}

#[test]
fn do_await_response_foreign_thenable() {
    let result = do_await_response(Value::thenable(Refuse(Value::from("refused"))), |response| {
        assert!(response.rejected);
        Ok(response.reason)
    });
    assert_eq!(result, Ok(Value::from("refused")));
}

#[test]
fn do_finally_keeps_runtime_flavor() {
    let rt = virtual_runtime();
    let log = Rc::new(RefCell::new(vec![]));
    let l = log.clone();
    let source = rt.idle(None).resolved("kept");
    let result = do_finally(source.into(), move || l.borrow_mut().push("cleanup".to_string())).unwrap();

    let derived = Promise::from_value(&result).unwrap();
    assert_eq!(derived.flavor_kind(), FlavorKind::Idle);
    rt.run_until_idle();
    assert_eq!(*log.borrow(), vec!["cleanup".to_string()]);
    assert_eq!(derived.outcome(), Some(Ok(Value::from("kept"))));
}

#[test]
fn do_finally_simulated_for_foreign_thenable() {
    let log = Rc::new(RefCell::new(vec![]));
    let l = log.clone();
    let result = do_finally(Value::thenable(Refuse(Value::from("x"))), move || {
        l.borrow_mut().push("cleanup".to_string())
    });

    assert_eq!(result, Err(Value::from("x")));
    assert_eq!(*log.borrow(), vec!["cleanup".to_string()]);
}
