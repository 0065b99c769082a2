//! Unit tests for TaskScheduler

use super::virtual_runtime;
use core_types::{ErrorKind, Value};
use promise_runtime::{Promise, PromiseState, Runtime};
use std::cell::RefCell;
use std::rc::Rc;
use task_scheduler::{TaskScheduler, TaskState};

fn never(rt: &Runtime) -> Value {
    rt.sync().create(|_, _| Ok(())).into()
}

fn reason_of(promise: &Promise) -> core_types::JsError {
    let reason = promise.outcome().unwrap().unwrap_err();
    reason.as_error().cloned().unwrap()
}

#[test]
fn tasks_run_strictly_in_order() {
    let rt = virtual_runtime();
    let flavor = rt.asynchronous(None);
    let scheduler = TaskScheduler::new(&rt, Some(flavor.clone()), Some("fifo"));
    let log = Rc::new(RefCell::new(Vec::<String>::new()));

    let l = log.clone();
    let f = flavor.clone();
    let a = scheduler.queue(
        move |_| {
            l.borrow_mut().push("A start".to_string());
            Ok(f.timeout(10, Some(Value::Smi(1))).into())
        },
        Some("a"),
        None,
    );

    let l = log.clone();
    let a_handle = a.clone();
    let b = scheduler.queue(
        move |_| {
            l.borrow_mut().push(format!("B start, A {}", a_handle.state()));
            Ok(Value::Smi(21))
        },
        Some("b"),
        None,
    );

    assert_eq!(*log.borrow(), vec!["A start".to_string()]);
    assert_eq!(scheduler.running_count(), 1);
    assert_eq!(scheduler.waiting_count(), 1);

    rt.run_for(9);
    assert_eq!(log.borrow().len(), 1);

    rt.run_until_idle();
    assert_eq!(
        *log.borrow(),
        vec!["A start".to_string(), "B start, A resolved".to_string()]
    );
    assert_eq!(a.outcome(), Some(Ok(Value::Smi(1))));
    assert_eq!(b.outcome(), Some(Ok(Value::Smi(21))));
    assert!(scheduler.is_idle());
}

#[test]
fn later_tasks_chain_after_newest_tail() {
    let rt = virtual_runtime();
    let flavor = rt.asynchronous(None);
    let scheduler = TaskScheduler::new(&rt, Some(flavor.clone()), Some("chain"));
    let order = Rc::new(RefCell::new(vec![]));

    for (n, delay) in [(1, 30), (2, 5), (3, 20), (4, 0)] {
        let o = order.clone();
        let f = flavor.clone();
        scheduler.queue(
            move |_| {
                o.borrow_mut().push(n);
                Ok(f.timeout(delay, Some(Value::Smi(n))).into())
            },
            None,
            None,
        );
    }

    rt.run_until_idle();
    assert_eq!(*order.borrow(), vec![1, 2, 3, 4]);
}

#[test]
fn rejection_does_not_break_ordering() {
    let rt = virtual_runtime();
    let flavor = rt.asynchronous(None);
    let scheduler = TaskScheduler::new(&rt, Some(flavor.clone()), Some("fail"));

    let f = flavor.clone();
    let failing = scheduler.queue(
        move |_| {
            Ok(f.timeout(5, Some(Value::Null))
                .and_then(|_| Err(Value::from("task failed")))
                .into())
        },
        None,
        None,
    );
    let observed = failing.catch(Ok);
    let next = scheduler.queue(|_| Ok(Value::from("ran")), None, None);

    rt.run_until_idle();
    assert_eq!(observed.outcome(), Some(Ok(Value::from("task failed"))));
    assert_eq!(next.outcome(), Some(Ok(Value::from("ran"))));
}

#[test]
fn synchronous_start_failure_rejects_only_that_task() {
    let rt = virtual_runtime();
    let scheduler = TaskScheduler::new(&rt, Some(rt.sync()), Some("sync"));

    let failing = scheduler.queue(|_| Err(Value::from("thrown")), None, None);
    let next = scheduler.queue(|_| Ok(Value::Smi(2)), None, None);

    assert_eq!(failing.outcome(), Some(Err(Value::from("thrown"))));
    assert_eq!(next.outcome(), Some(Ok(Value::Smi(2))));
    assert!(scheduler.is_idle());
    failing.catch(Ok);
}

#[test]
fn panicking_start_rejects_task_and_frees_the_queue() {
    let rt = virtual_runtime();
    let scheduler = TaskScheduler::new(&rt, Some(rt.asynchronous(None)), Some("boom"));

    let failing = scheduler.queue(|_| panic!("start exploded"), None, None);
    failing.catch(Ok);
    let next = scheduler.queue(|_| Ok(Value::Smi(2)), None, None);
    rt.run_until_idle();

    let reason = reason_of(&failing);
    assert_eq!(reason.kind, ErrorKind::InternalError);
    assert_eq!(reason.message, "start exploded");
    assert_eq!(next.outcome(), Some(Ok(Value::Smi(2))));
    assert_eq!(scheduler.running_count(), 0);
    assert!(scheduler.is_idle());
}

#[test]
fn timeout_rejects_task_promise() {
    let rt = virtual_runtime();
    let flavor = rt.asynchronous(None);
    let scheduler = TaskScheduler::new(&rt, Some(flavor.clone()), Some("slow"));

    let f = flavor.clone();
    let task = scheduler.queue(
        move |_| Ok(f.timeout(150, Some(Value::from("late result"))).into()),
        Some("work"),
        Some(100),
    );
    task.catch(|_| Ok(Value::Undefined));

    rt.run_for(99);
    assert_eq!(task.state(), PromiseState::Pending);
    rt.run_for(1);
    let error = reason_of(&task);
    assert_eq!(error.kind, ErrorKind::TimeoutError);
    assert!(error.message.contains("Timeout"));
    assert!(error.message.contains("slow.1-(work)"));

    // The underlying work still finishes; the task stays rejected.
    rt.run_until_idle();
    assert_eq!(task.state(), PromiseState::Rejected);
    assert!(scheduler.is_idle());
}

#[test]
fn timeout_cleared_when_task_settles_in_time() {
    let rt = virtual_runtime();
    let flavor = rt.asynchronous(None);
    let scheduler = TaskScheduler::new(&rt, Some(flavor.clone()), None);
    scheduler.set_stale_timeout(0, None);

    let f = flavor.clone();
    let task = scheduler.queue(move |_| Ok(f.timeout(10, Some(Value::Smi(1))).into()), None, Some(100));

    rt.run_for(20);
    assert_eq!(task.outcome(), Some(Ok(Value::Smi(1))));
    assert_eq!(rt.event_loop().timer_count(), 0);
}

#[test]
fn plain_result_never_arms_timeout() {
    let rt = virtual_runtime();
    let scheduler = TaskScheduler::new(&rt, Some(rt.sync()), None);
    let task = scheduler.queue(|_| Ok(Value::Smi(3)), None, Some(5));
    assert_eq!(task.outcome(), Some(Ok(Value::Smi(3))));
    assert_eq!(rt.event_loop().timer_count(), 0);
}

#[test]
fn stale_task_is_aborted_and_scheduler_goes_idle() {
    let rt = virtual_runtime();
    let scheduler = TaskScheduler::new(&rt, Some(rt.asynchronous(None)), Some("stale"));
    scheduler.set_stale_timeout(200, None);

    let work = never(&rt);
    let task = scheduler.queue(move |_| Ok(work), None, None);
    task.catch(|_| Ok(Value::Undefined));
    assert!(!scheduler.is_idle());

    rt.run_until_idle();
    let error = reason_of(&task);
    assert_eq!(error.kind, ErrorKind::AbortError);
    assert!(error.message.contains("Aborted"));
    assert!(scheduler.is_idle());
    assert!(rt.now_ms() > 200 && rt.now_ms() <= 220);
}

#[test]
fn aborted_waiting_task_never_starts() {
    let rt = virtual_runtime();
    let scheduler = TaskScheduler::new(&rt, Some(rt.sync()), Some("evict"));
    scheduler.set_stale_timeout(200, Some(50));
    let started = Rc::new(RefCell::new(false));

    let work = never(&rt);
    let first = scheduler.queue(move |_| Ok(work), None, None);
    let s = started.clone();
    let second = scheduler.queue(
        move |_| {
            *s.borrow_mut() = true;
            Ok(Value::Undefined)
        },
        None,
        None,
    );
    first.catch(|_| Ok(Value::Undefined));
    second.catch(|_| Ok(Value::Undefined));

    rt.run_until_idle();
    assert!(!*started.borrow());
    assert_eq!(reason_of(&first).kind, ErrorKind::AbortError);
    assert_eq!(reason_of(&second).kind, ErrorKind::AbortError);
    assert!(scheduler.is_idle());
}

#[test]
fn disabled_sweep_keeps_stuck_task() {
    let rt = virtual_runtime();
    let scheduler = TaskScheduler::new(&rt, Some(rt.sync()), None);
    scheduler.set_stale_timeout(-5, None);

    let work = never(&rt);
    let task = scheduler.queue(move |_| Ok(work), None, None);
    rt.run_for(10_000);
    assert_eq!(task.state(), PromiseState::Pending);
    assert_eq!(scheduler.running_count(), 1);
    assert_eq!(rt.event_loop().timer_count(), 0);
}

#[test]
fn task_details_track_lifecycle() {
    let rt = virtual_runtime();
    let flavor = rt.asynchronous(None);
    let scheduler = TaskScheduler::new(&rt, Some(flavor.clone()), Some("life"));

    let f = flavor.clone();
    scheduler.queue(move |_| Ok(f.timeout(10, Some(Value::Null)).into()), Some("one"), None);
    scheduler.queue(|_| Ok(Value::Null), Some("two"), None);

    let tasks = scheduler.tasks();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id(), "life.1-(one)");
    assert_eq!(tasks[0].state(), TaskState::Running);
    assert_eq!(tasks[1].id(), "life.2-(two)");
    assert_eq!(tasks[1].state(), TaskState::Waiting);

    let second = tasks[1].clone();
    rt.run_until_idle();
    assert_eq!(second.state(), TaskState::Settled);
    assert_eq!(second.started_at(), Some(10));
    assert!(scheduler.tasks().is_empty());
}

#[test]
fn idle_after_queue_drains() {
    let rt = virtual_runtime();
    let scheduler = TaskScheduler::new(&rt, None, Some("drain"));
    assert!(scheduler.is_idle());

    let f = rt.asynchronous(None);
    for n in 0..3 {
        let f = f.clone();
        scheduler.queue(move |_| Ok(f.timeout(5, Some(Value::Smi(n))).into()), None, None);
    }
    assert!(!scheduler.is_idle());
    rt.run_until_idle();
    assert!(scheduler.is_idle());
    assert_eq!(rt.event_loop().timer_count(), 0);
}
