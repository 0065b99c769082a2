//! Unit tests for unhandled-rejection detection

use super::virtual_runtime;
use core_types::Value;
use promise_runtime::{Promise, Runtime, UnhandledRejection};
use std::cell::RefCell;
use std::rc::Rc;

fn listen(rt: &Runtime) -> Rc<RefCell<Vec<UnhandledRejection>>> {
    let events = Rc::new(RefCell::new(vec![]));
    let e = events.clone();
    rt.on_unhandled_rejection(move |event| e.borrow_mut().push(event.clone()));
    events
}

#[test]
fn reported_exactly_once() {
    let rt = virtual_runtime();
    let events = listen(&rt);
    let promise = rt.asynchronous(None).rejected("lost");

    rt.run_until_idle();
    rt.run_for(1_000);
    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, Value::from("lost"));
    assert!(events[0].promise.ptr_eq(&promise));
}

#[test]
fn only_unobserved_tail_of_chain_is_reported() {
    let rt = virtual_runtime();
    let events = listen(&rt);
    let head = rt.sync().rejected("deep");
    let tail = head.and_then(Ok).and_then(Ok);

    rt.run_until_idle();
    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert!(events[0].promise.ptr_eq(&tail));
    assert!(!events[0].promise.ptr_eq(&head));
}

#[test]
fn late_handler_after_grace_still_runs() {
    let rt = virtual_runtime();
    let events = listen(&rt);
    let promise = rt.sync().rejected("late");
    rt.run_for(50);
    assert_eq!(events.borrow().len(), 1);

    let recovered = promise.catch(Ok);
    assert_eq!(recovered.outcome(), Some(Ok(Value::from("late"))));
    rt.run_until_idle();
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn grace_period_is_configurable() {
    let rt = virtual_runtime();
    let events = listen(&rt);
    rt.set_unhandled_grace_period(100);
    let promise = rt.sync().rejected("slow");

    rt.run_for(99);
    promise.catch(|_| Ok(Value::Undefined));
    rt.run_until_idle();
    assert!(events.borrow().is_empty());
}

#[test]
fn combinator_inputs_count_as_handled() {
    let rt = virtual_runtime();
    let events = listen(&rt);
    let flavor = rt.sync();
    let failing = flavor.rejected("input");
    let all = flavor.all(vec![Value::from(failing), Value::Smi(1)]);
    all.catch(|_| Ok(Value::Undefined));

    rt.run_until_idle();
    assert!(events.borrow().is_empty());
}

#[test]
fn fallback_without_listener_does_not_panic() {
    let rt = virtual_runtime();
    let events = listen(&rt);
    rt.clear_unhandled_listener();
    let _promise: Promise = rt.sync().rejected("logged");
    rt.run_until_idle();
    assert!(events.borrow().is_empty());
}
