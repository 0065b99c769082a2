//! Unit tests for promise debugging

use super::virtual_runtime;
use core_types::Value;
use promise_runtime::{DebugEvent, FlavorKind, PromiseState, Runtime};
use std::cell::RefCell;
use std::rc::Rc;

fn capture(rt: &Runtime) -> Rc<RefCell<Vec<DebugEvent>>> {
    let events = Rc::new(RefCell::new(vec![]));
    let e = events.clone();
    rt.set_promise_debug_state(
        true,
        Some(Rc::new(move |event: &DebugEvent| e.borrow_mut().push(event.clone()))),
    );
    events
}

#[test]
fn debug_info_hidden_while_disabled() {
    let rt = virtual_runtime();
    let promise = rt.sync().resolved(1);
    assert!(promise.debug_info().is_none());
}

#[test]
fn debug_info_exposes_internals() {
    let rt = virtual_runtime();
    rt.set_promise_debug_state(true, None);
    let promise = rt.asynchronous(None).create(|_, _| Ok(()));
    promise.and_then(Ok);
    promise.and_then(Ok);

    let info = promise.debug_info().unwrap();
    assert_eq!(info.id, promise.id());
    assert_eq!(info.flavor, FlavorKind::Async);
    assert_eq!(info.state, PromiseState::Pending);
    assert_eq!(info.result, None);
    assert!(info.handled);
    assert_eq!(info.pending_reactions, 2);
}

#[test]
fn every_transition_is_logged() {
    let rt = virtual_runtime();
    let events = capture(&rt);
    let inner = rt.sync().timeout(5, Some(Value::Smi(9)));
    let outer = rt.sync().resolved(Value::from(inner.clone()));
    assert!(outer.ptr_eq(&inner));

    let follower = rt.sync().create(move |resolve, _| {
        resolve.resolve(inner);
        Ok(())
    });
    rt.run_until_idle();

    let transitions: Vec<(u64, PromiseState, PromiseState)> = events
        .borrow()
        .iter()
        .filter(|e| e.id == follower.id())
        .map(|e| (e.id, e.from, e.to))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (follower.id(), PromiseState::Pending, PromiseState::Resolving),
            (follower.id(), PromiseState::Resolving, PromiseState::Resolved),
        ]
    );
    let last = events.borrow().iter().rfind(|e| e.id == follower.id()).cloned().unwrap();
    assert_eq!(last.detail.as_deref(), Some("9"));
}

#[test]
fn disabling_stops_events() {
    let rt = virtual_runtime();
    let events = capture(&rt);
    rt.sync().resolved(1);
    let seen = events.borrow().len();
    assert!(seen > 0);

    rt.set_promise_debug_state(false, None);
    rt.sync().resolved(2);
    assert_eq!(events.borrow().len(), seen);
    assert!(!rt.is_debug_enabled());
}

#[test]
fn debugging_does_not_change_behavior() {
    let plain = virtual_runtime();
    let debugged = virtual_runtime();
    capture(&debugged);

    let outcomes: Vec<_> = [plain, debugged]
        .iter()
        .map(|rt| {
            let flavor = rt.asynchronous(None);
            let promise = flavor.all(vec![flavor.timeout(3, Some(Value::Smi(1))).into(), Value::Smi(2)]);
            rt.run_until_idle();
            promise.outcome()
        })
        .collect();
    assert_eq!(outcomes[0], outcomes[1]);
}
