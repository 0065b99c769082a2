//! FIFO task scheduler built on the promise runtime.
//!
//! # Overview
//!
//! - [`TaskScheduler`] - Runs queued tasks one at a time in submission order
//! - [`TaskDetail`] - Read-only view of one queued task
//! - [`TaskState`] - Waiting, running, settled or aborted
//!
//! Tasks that outlive the stale timeout, or that miss their own timeout, are
//! rejected without their underlying work being cancelled.
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, Value};
//! use promise_runtime::{EventLoop, Runtime};
//! use task_scheduler::create_task_scheduler;
//!
//! let runtime = Runtime::with_event_loop(EventLoop::with_virtual_clock());
//! let scheduler = create_task_scheduler(&runtime, Some(runtime.sync()), Some("io"));
//!
//! let never = runtime.sync().create(|_, _| Ok(()));
//! let task = scheduler.queue(move |_| Ok(never.into()), Some("hang"), Some(100));
//! let reason = task.catch(Ok);
//!
//! runtime.run_for(100);
//! let error = reason.outcome().unwrap().unwrap();
//! assert_eq!(error.as_error().map(|e| e.kind), Some(ErrorKind::TimeoutError));
//! assert!(scheduler.is_idle());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod scheduler;
pub mod task;

pub use scheduler::{create_task_scheduler, TaskScheduler, DEFAULT_SCHEDULER_NAME};
pub use task::{TaskDetail, TaskState};
