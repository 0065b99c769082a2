//! Unit tests for EventLoop

use promise_runtime::{Clock, EventLoop, HostCapabilities, VirtualClock};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn new_event_loop_has_nothing_pending() {
    let event_loop = EventLoop::with_virtual_clock();
    assert!(!event_loop.has_pending());
    assert_eq!(event_loop.timer_count(), 0);
}

#[test]
fn default_capabilities_offer_everything() {
    let event_loop = EventLoop::with_virtual_clock();
    assert!(event_loop.supports_microtasks());
    assert!(event_loop.supports_idle());
}

#[test]
fn timers_fire_in_deadline_order() {
    let event_loop = EventLoop::with_virtual_clock();
    let order = Rc::new(RefCell::new(vec![]));

    for (delay, label) in [(30, "c"), (10, "a"), (20, "b")] {
        let o = order.clone();
        event_loop.set_timeout(delay, move || o.borrow_mut().push(label));
    }

    event_loop.run_until_idle();
    assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    assert_eq!(event_loop.now_ms(), 30);
}

#[test]
fn equal_deadlines_fire_in_scheduling_order() {
    let event_loop = EventLoop::with_virtual_clock();
    let order = Rc::new(RefCell::new(vec![]));

    for n in 0..5 {
        let o = order.clone();
        event_loop.set_timeout(0, move || o.borrow_mut().push(n));
    }

    event_loop.run_until_idle();
    assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn cleared_timer_never_fires() {
    let event_loop = EventLoop::with_virtual_clock();
    let fired = Rc::new(Cell::new(false));
    let f = fired.clone();
    let id = event_loop.set_timeout(10, move || f.set(true));

    assert!(event_loop.clear_timeout(id));
    event_loop.run_until_idle();
    assert!(!fired.get());
    assert!(!event_loop.clear_timeout(id));
}

#[test]
fn microtasks_scheduled_by_timer_run_before_next_timer() {
    let event_loop = EventLoop::with_virtual_clock();
    let order = Rc::new(RefCell::new(vec![]));

    let o = order.clone();
    let el = event_loop.clone();
    event_loop.set_timeout(0, move || {
        o.borrow_mut().push("timer 1");
        let o2 = o.clone();
        el.queue_microtask(move || o2.borrow_mut().push("microtask"));
    });
    let o = order.clone();
    event_loop.set_timeout(0, move || o.borrow_mut().push("timer 2"));

    event_loop.run_until_idle();
    assert_eq!(*order.borrow(), vec!["timer 1", "microtask", "timer 2"]);
}

#[test]
fn idle_callback_runs_in_gap_before_later_timer() {
    let event_loop = EventLoop::with_virtual_clock();
    let order = Rc::new(RefCell::new(vec![]));

    let o = order.clone();
    event_loop.set_timeout(10, move || o.borrow_mut().push("timer"));
    let o = order.clone();
    let el = event_loop.clone();
    event_loop.request_idle_callback(Some(50), move || {
        let label = if el.now_ms() == 0 { "idle at 0" } else { "idle late" };
        o.borrow_mut().push(label);
    });

    event_loop.run_until_idle();
    assert_eq!(*order.borrow(), vec!["idle at 0", "timer"]);
}

#[test]
fn idle_callback_can_be_cancelled() {
    let event_loop = EventLoop::with_virtual_clock();
    let ran = Rc::new(Cell::new(false));
    let r = ran.clone();
    let id = event_loop.request_idle_callback(None, move || r.set(true));

    assert!(event_loop.clear_timeout(id));
    event_loop.run_until_idle();
    assert!(!ran.get());
}

#[test]
fn run_for_executes_only_due_work() {
    let event_loop = EventLoop::with_virtual_clock();
    let count = Rc::new(Cell::new(0));
    for delay in [5, 10, 15] {
        let c = count.clone();
        event_loop.set_timeout(delay, move || c.set(c.get() + 1));
    }

    event_loop.run_for(10);
    assert_eq!(count.get(), 2);
    assert_eq!(event_loop.now_ms(), 10);
    assert!(event_loop.has_pending());
}

#[test]
fn custom_clock_start_time_is_respected() {
    let clock = Rc::new(VirtualClock::new(1_000));
    let event_loop = EventLoop::with_capabilities(clock.clone(), HostCapabilities::default());
    let fired_at = Rc::new(Cell::new(0));
    let f = fired_at.clone();
    let el = event_loop.clone();
    event_loop.set_timeout(50, move || f.set(el.now_ms()));

    event_loop.run_until_idle();
    assert_eq!(fired_at.get(), 1_050);
    assert_eq!(clock.now_ms(), 1_050);
}
