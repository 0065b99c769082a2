//! FIFO task scheduler.
//!
//! Tasks run strictly one at a time in submission order. Each queued task
//! waits for the previous tail task's promise to settle (whatever the outcome)
//! before its start function is invoked. Running and waiting tasks can be
//! force-rejected by a per-task timeout or by the recurring stale sweep; in
//! both cases only the scheduler-facing promise is rejected and the underlying
//! work keeps going.

use crate::task::TaskDetail;
use core_types::{Completion, Handler, JsError, Value};
use promise_runtime::{do_await, do_await_response, Flavor, Promise, Rejecter, Resolver, Runtime, TimerId};
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

/// Name used when a scheduler is created without one.
pub const DEFAULT_SCHEDULER_NAME: &str = "<unnamed>";

struct SchedulerState {
    task_count: u64,
    tail: Option<Rc<TaskDetail>>,
    running: Vec<Rc<TaskDetail>>,
    waiting: Vec<Rc<TaskDetail>>,
    stale_timeout_ms: u64,
    stale_check_period_ms: u64,
    sweep_timer: Option<TimerId>,
}

struct SchedulerInner {
    runtime: Runtime,
    flavor: Flavor,
    name: String,
    state: RefCell<SchedulerState>,
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().sweep_timer.take() {
            self.runtime.event_loop().clear_timeout(timer);
        }
    }
}

/// Serializes asynchronous tasks.
///
/// # Examples
///
/// ```
/// use core_types::Value;
/// use promise_runtime::{EventLoop, Runtime};
/// use task_scheduler::TaskScheduler;
///
/// let runtime = Runtime::with_event_loop(EventLoop::with_virtual_clock());
/// let scheduler = TaskScheduler::new(&runtime, None, Some("jobs"));
///
/// let flavor = runtime.asynchronous(None);
/// let first = scheduler.queue(move |_| Ok(flavor.timeout(10, Some(Value::Smi(1))).into()), None, None);
/// let second = scheduler.queue(|id| Ok(Value::from(id)), Some("label"), None);
///
/// runtime.run_until_idle();
/// assert_eq!(first.outcome(), Some(Ok(Value::Smi(1))));
/// assert_eq!(second.outcome(), Some(Ok(Value::from("jobs.2-(label)"))));
/// assert!(scheduler.is_idle());
/// ```
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Rc<SchedulerInner>,
}

impl TaskScheduler {
    /// Creates a scheduler.
    ///
    /// Task promises use `flavor`, or the runtime's default flavor. The stale
    /// timeout starts at the runtime's configured value.
    pub fn new(runtime: &Runtime, flavor: Option<Flavor>, name: Option<&str>) -> Self {
        let flavor = flavor.unwrap_or_else(|| runtime.default_flavor());
        let name = name.unwrap_or(DEFAULT_SCHEDULER_NAME).to_string();
        let stale_timeout_ms = runtime.stale_timeout_ms();
        tracing::debug!(
            event = "scheduler.create",
            scheduler = %name,
            flavor = %flavor.kind(),
            stale_timeout_ms,
            "Task scheduler created"
        );
        Self {
            inner: Rc::new(SchedulerInner {
                runtime: runtime.clone(),
                flavor,
                name,
                state: RefCell::new(SchedulerState {
                    task_count: 0,
                    tail: None,
                    running: Vec::new(),
                    waiting: Vec::new(),
                    stale_timeout_ms,
                    stale_check_period_ms: default_check_period(stale_timeout_ms),
                    sweep_timer: None,
                }),
            }),
        }
    }

    /// The scheduler's name, used as the task id prefix.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The flavor of the promises `queue` returns.
    pub fn flavor(&self) -> &Flavor {
        &self.inner.flavor
    }

    /// Returns true when no task is running or waiting.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.borrow();
        state.running.is_empty() && state.waiting.is_empty()
    }

    /// Number of running tasks.
    pub fn running_count(&self) -> usize {
        self.inner.state.borrow().running.len()
    }

    /// Number of tasks waiting for their turn.
    pub fn waiting_count(&self) -> usize {
        self.inner.state.borrow().waiting.len()
    }

    /// Running tasks followed by waiting tasks, in queue order.
    pub fn tasks(&self) -> Vec<Rc<TaskDetail>> {
        let state = self.inner.state.borrow();
        state.running.iter().chain(state.waiting.iter()).cloned().collect()
    }

    /// Current stale timeout; zero when the sweep is disabled.
    pub fn stale_timeout_ms(&self) -> u64 {
        self.inner.state.borrow().stale_timeout_ms
    }

    /// Current sweep period.
    pub fn stale_check_period_ms(&self) -> u64 {
        self.inner.state.borrow().stale_check_period_ms
    }

    /// Configures stale-task eviction.
    ///
    /// `timeout_ms <= 0` disables the sweep and cancels any active sweep
    /// timer. The check period defaults to a tenth of the timeout.
    pub fn set_stale_timeout(&self, timeout_ms: i64, check_period_ms: Option<i64>) {
        let timeout_ms = u64::try_from(timeout_ms).unwrap_or(0);
        let period_ms = match check_period_ms.and_then(|p| u64::try_from(p).ok()) {
            Some(period) if period > 0 => period,
            _ => default_check_period(timeout_ms),
        };
        let previous = {
            let mut state = self.inner.state.borrow_mut();
            state.stale_timeout_ms = timeout_ms;
            state.stale_check_period_ms = period_ms;
            state.sweep_timer.take()
        };
        if let Some(timer) = previous {
            self.inner.runtime.event_loop().clear_timeout(timer);
        }
        tracing::debug!(
            event = "scheduler.stale.configure",
            scheduler = %self.inner.name,
            timeout_ms,
            period_ms,
            "Stale sweep configured"
        );
        self.update_stale_timer();
    }

    /// Queues a task and returns a promise mirroring its outcome.
    ///
    /// `start` receives the task id and may return a plain value or a
    /// thenable. It is not invoked before every previously queued task has
    /// settled. `label` is appended to the task id. `timeout_ms` rejects the
    /// task with a `TimeoutError` if it returned a thenable that has not
    /// settled in time.
    pub fn queue<F>(&self, start: F, label: Option<&str>, timeout_ms: Option<u64>) -> Promise
    where
        F: FnOnce(&str) -> Completion + 'static,
    {
        let (detail, previous) = {
            let mut state = self.inner.state.borrow_mut();
            state.task_count += 1;
            let mut id = format!("{}.{}", self.inner.name, state.task_count);
            if let Some(label) = label {
                id.push_str(&format!("-({})", label));
            }
            let detail = Rc::new(TaskDetail::new(id, self.inner.runtime.now_ms(), timeout_ms));
            let previous = state.tail.as_ref().and_then(|tail| tail.promise());
            (detail, previous)
        };
        tracing::debug!(
            event = "scheduler.task.queue",
            task = detail.id(),
            waiting = previous.is_some(),
            "Task queued"
        );

        let scheduler = self.clone();
        let task = detail.clone();
        let promise = match previous {
            None => self.inner.flavor.create(move |resolve, reject| {
                scheduler.run_task(&task, start, resolve, reject);
                Ok(())
            }),
            Some(previous) => self.inner.flavor.create(move |resolve, reject| {
                task.arm_reject(reject.clone());
                scheduler.inner.state.borrow_mut().waiting.push(task.clone());
                scheduler.update_stale_timer();
                let s = scheduler.clone();
                do_await_response(previous.into(), move |_| {
                    s.start_waiting(&task, start, resolve, reject);
                    Ok(Value::Undefined)
                })?;
                Ok(())
            }),
        };

        detail.set_promise(promise.clone());
        if !detail.is_finished() {
            self.inner.state.borrow_mut().tail = Some(detail);
        }
        promise
    }

    fn start_waiting<F>(&self, task: &Rc<TaskDetail>, start: F, resolve: Resolver, reject: Rejecter)
    where
        F: FnOnce(&str) -> Completion + 'static,
    {
        self.inner
            .state
            .borrow_mut()
            .waiting
            .retain(|t| !Rc::ptr_eq(t, task));
        if !task.can_reject() {
            tracing::debug!(event = "scheduler.task.skip", task = task.id(), "Aborted task never starts");
            return;
        }
        self.run_task(task, start, resolve, reject);
    }

    fn run_task<F>(&self, task: &Rc<TaskDetail>, start: F, resolve: Resolver, reject: Rejecter)
    where
        F: FnOnce(&str) -> Completion + 'static,
    {
        task.mark_started(self.inner.runtime.now_ms());
        task.arm_reject(reject.clone());
        self.inner.state.borrow_mut().running.push(task.clone());
        self.update_stale_timer();
        tracing::debug!(event = "scheduler.task.start", task = task.id(), "Task started");

        let id = task.id();
        let started = panic::catch_unwind(AssertUnwindSafe(move || start(id)))
            .unwrap_or_else(|payload| Err(JsError::from_panic(payload.as_ref()).into()));
        let value = match started {
            Ok(value) => value,
            Err(reason) => {
                tracing::debug!(event = "scheduler.task.fail", task = task.id(), %reason, "Task start failed");
                self.finish(task);
                reject.reject(reason);
                return;
            }
        };

        if let (true, Some(timeout_ms)) = (value.is_thenable(), task.timeout_ms()) {
            let scheduler = self.clone();
            let timed = task.clone();
            let timer = self.inner.runtime.event_loop().set_timeout(timeout_ms, move || {
                let reason = JsError::timeout(format!("Task [{}] Timeout", timed.id()));
                scheduler.abort(&timed, reason.into());
            });
            task.set_timeout_timer(timer);
        }

        let (s1, t1) = (self.clone(), task.clone());
        let (s2, t2) = (self.clone(), task.clone());
        let on_failure = reject.clone();
        let bridged = do_await(
            value,
            Some(Handler::infallible(move |value| {
                s1.finish(&t1);
                resolve.resolve(value);
                Value::Undefined
            })),
            Some(Handler::infallible(move |reason| {
                s2.finish(&t2);
                reject.reject(reason);
                Value::Undefined
            })),
            None,
        );
        if let Err(reason) = bridged {
            self.finish(task);
            on_failure.reject(reason);
        }
    }

    fn finish(&self, task: &Rc<TaskDetail>) {
        // An aborted task has already been removed.
        if task.take_reject().is_none() {
            return;
        }
        task.mark_finished();
        tracing::debug!(event = "scheduler.task.finish", task = task.id(), "Task settled");
        self.remove(task);
    }

    /// Force-rejects a task. Only the first call for a task has any effect.
    fn abort(&self, task: &Rc<TaskDetail>, reason: Value) {
        let Some(reject) = task.take_reject() else {
            return;
        };
        tracing::debug!(
            event = "scheduler.task.abort",
            scheduler = %self.inner.name,
            task = task.id(),
            %reason,
            "Task aborted"
        );
        task.set_reject_reason(reason.clone());
        task.mark_finished();
        self.remove(task);
        reject.reject(reason);
    }

    fn remove(&self, task: &Rc<TaskDetail>) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.running.retain(|t| !Rc::ptr_eq(t, task));
            state.waiting.retain(|t| !Rc::ptr_eq(t, task));
            if state.tail.as_ref().is_some_and(|tail| Rc::ptr_eq(tail, task)) {
                state.tail = None;
            }
        }
        if let Some(timer) = task.take_timeout_timer() {
            self.inner.runtime.event_loop().clear_timeout(timer);
        }
        self.update_stale_timer();
    }

    /// Arms the sweep while tasks are outstanding, cancels it otherwise.
    fn update_stale_timer(&self) {
        let mut state = self.inner.state.borrow_mut();
        let outstanding = !state.running.is_empty() || !state.waiting.is_empty();
        if !outstanding || state.stale_timeout_ms == 0 {
            let cancelled = state.sweep_timer.take();
            drop(state);
            if let Some(timer) = cancelled {
                self.inner.runtime.event_loop().clear_timeout(timer);
                tracing::trace!(event = "scheduler.stale.disarm", timer, "Stale sweep cancelled");
            }
            return;
        }
        if state.sweep_timer.is_some() {
            return;
        }
        let weak: Weak<SchedulerInner> = Rc::downgrade(&self.inner);
        let period_ms = state.stale_check_period_ms;
        let timer = self.inner.runtime.event_loop().set_interval(period_ms, move || {
            if let Some(inner) = weak.upgrade() {
                TaskScheduler { inner }.sweep();
            }
        });
        state.sweep_timer = Some(timer);
        tracing::trace!(event = "scheduler.stale.arm", timer, period_ms, "Stale sweep armed");
    }

    fn sweep(&self) {
        let now = self.inner.runtime.now_ms();
        let stale: Vec<Rc<TaskDetail>> = {
            let state = self.inner.state.borrow();
            let timeout = state.stale_timeout_ms;
            // Waiting tasks first, so none of them starts in reaction to an
            // earlier running task being aborted in this same sweep.
            state
                .waiting
                .iter()
                .chain(state.running.iter())
                .filter(|task| task.is_stale(now, timeout))
                .cloned()
                .collect()
        };
        for task in stale {
            let reason = JsError::aborted(format!("Task [{}] Aborted", task.id()));
            self.abort(&task, reason.into());
        }
    }
}

fn default_check_period(timeout_ms: u64) -> u64 {
    (timeout_ms / 10).max(1)
}

impl fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("TaskScheduler")
            .field("name", &self.inner.name)
            .field("flavor", &self.inner.flavor.kind())
            .field("running", &state.running)
            .field("waiting", &state.waiting)
            .field("stale_timeout_ms", &state.stale_timeout_ms)
            .finish()
    }
}

/// Creates a scheduler; see [`TaskScheduler::new`].
pub fn create_task_scheduler(runtime: &Runtime, flavor: Option<Flavor>, name: Option<&str>) -> TaskScheduler {
    TaskScheduler::new(runtime, flavor, name)
}
