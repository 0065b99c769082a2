//! Property tests for settlement and combinator ordering

use super::virtual_runtime;
use core_types::Value;
use proptest::prelude::*;
use promise_runtime::{Rejecter, Resolver};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone)]
enum Attempt {
    Resolve(i32),
    Reject(i32),
}

fn attempt() -> impl Strategy<Value = Attempt> {
    prop_oneof![
        any::<i32>().prop_map(Attempt::Resolve),
        any::<i32>().prop_map(Attempt::Reject),
    ]
}

proptest! {
    #[test]
    fn first_transition_wins(attempts in prop::collection::vec(attempt(), 1..16)) {
        let rt = virtual_runtime();
        let slot: Rc<RefCell<Option<(Resolver, Rejecter)>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let promise = rt.asynchronous(None).create(move |resolve, reject| {
            *s.borrow_mut() = Some((resolve, reject));
            Ok(())
        });
        let observed = promise.then(None, None).catch(|reason| Ok(Value::Array(vec![reason])));

        let (resolve, reject) = slot.borrow_mut().take().unwrap();
        for attempt in &attempts {
            match attempt {
                Attempt::Resolve(n) => resolve.resolve(*n),
                Attempt::Reject(n) => reject.reject(*n),
            }
        }
        rt.run_until_idle();

        let expected = match &attempts[0] {
            Attempt::Resolve(n) => Value::Smi(*n),
            Attempt::Reject(n) => Value::Array(vec![Value::Smi(*n)]),
        };
        prop_assert_eq!(observed.outcome(), Some(Ok(expected)));
    }

    #[test]
    fn all_preserves_input_order(delays in prop::collection::vec(0..50u64, 0..12)) {
        let rt = virtual_runtime();
        let flavor = rt.asynchronous(None);
        let inputs: Vec<Value> = delays
            .iter()
            .enumerate()
            .map(|(i, &ms)| flavor.timeout(ms, Some(Value::Smi(i as i32))).into())
            .collect();
        let promise = flavor.all(inputs);

        rt.run_until_idle();
        let expected: Vec<Value> = (0..delays.len()).map(|i| Value::Smi(i as i32)).collect();
        prop_assert_eq!(promise.outcome(), Some(Ok(Value::Array(expected))));
    }

    #[test]
    fn continuations_run_fifo(count in 1..20usize, delay in 0..10u64) {
        let rt = virtual_runtime();
        let promise = rt.asynchronous(Some(delay)).resolved(0);
        let order = Rc::new(RefCell::new(vec![]));
        for n in 0..count {
            let o = order.clone();
            promise.and_then(move |v| {
                o.borrow_mut().push(n);
                Ok(v)
            });
        }

        rt.run_until_idle();
        prop_assert_eq!(order.borrow().clone(), (0..count).collect::<Vec<_>>());
    }
}
