//! Contract tests for promise_runtime
//!
//! These tests pin down the public surface other components build on: the
//! constructors, the state names, the thenable bridge and the host hooks.

use core_types::{Thenable, Value};
use promise_runtime::{
    create_async_promise, create_idle_promise, create_native_promise, create_sync_promise, do_await,
    do_await_response, do_finally, EventLoop, FlavorKind, Promise, PromiseState, Runtime,
    RuntimeConfig,
};

fn runtime() -> Runtime {
    Runtime::with_event_loop(EventLoop::with_virtual_clock())
}

mod constructor_contract {
    use super::*;

    #[test]
    fn constructors_return_promise_of_their_flavor() {
        let rt = runtime();
        let noop = |_, _| Ok(());
        assert_eq!(create_sync_promise(&rt, noop).flavor_kind(), FlavorKind::Sync);
        assert_eq!(create_async_promise(&rt, noop, None).flavor_kind(), FlavorKind::Async);
        assert_eq!(create_idle_promise(&rt, noop, Some(10)).flavor_kind(), FlavorKind::Idle);
        assert_eq!(create_native_promise(&rt, noop).flavor_kind(), FlavorKind::Native);
    }

    #[test]
    fn executor_err_is_a_rejection() {
        let rt = runtime();
        let promise = create_sync_promise(&rt, |_, _| Err(Value::from("thrown")));
        assert_eq!(promise.outcome(), Some(Err(Value::from("thrown"))));
        promise.catch(Ok);
    }
}

mod state_contract {
    use super::*;

    #[test]
    fn state_names_are_lowercase() {
        let names: Vec<&str> = [
            PromiseState::Pending,
            PromiseState::Resolving,
            PromiseState::Resolved,
            PromiseState::Rejected,
        ]
        .iter()
        .map(|s| s.as_str())
        .collect();
        assert_eq!(names, vec!["pending", "resolving", "resolved", "rejected"]);
    }

    #[test]
    fn only_terminal_states_are_settled() {
        assert!(!PromiseState::Pending.is_settled());
        assert!(!PromiseState::Resolving.is_settled());
        assert!(PromiseState::Resolved.is_settled());
        assert!(PromiseState::Rejected.is_settled());
    }
}

mod thenable_contract {
    use super::*;

    #[test]
    fn promise_then_returns_promise() {
        let rt = runtime();
        let promise = rt.sync().resolved(1);
        let chained = Thenable::then(&promise, None, None).unwrap();
        assert!(Promise::from_value(&chained).is_some());
    }

    #[test]
    fn combinators_accept_plain_values() {
        assert_eq!(do_await(Value::Smi(1), None, None, None), Ok(Value::Smi(1)));
        assert_eq!(do_finally(Value::Null, || {}), Ok(Value::Null));
        assert_eq!(
            do_await_response(Value::Boolean(true), |r| Ok(r.value)),
            Ok(Value::Boolean(true))
        );
    }
}

mod config_contract {
    use super::*;

    #[test]
    fn runtime_config_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.default_flavor, FlavorKind::Native);
        assert_eq!(config.unhandled_grace_ms, 10);
        assert_eq!(config.stale_timeout_ms, 600_000);
        assert!(!config.debug);
    }

    #[test]
    fn runtime_exposes_its_event_loop() {
        let rt = runtime();
        rt.event_loop().set_timeout(5, || {});
        assert_eq!(rt.event_loop().timer_count(), 1);
        rt.run_until_idle();
        assert_eq!(rt.now_ms(), 5);
    }
}
