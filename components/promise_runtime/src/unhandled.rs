//! Unhandled-rejection detection.
//!
//! A rejection nobody has attached a continuation to arms a one-shot grace
//! timer. Attaching any continuation before the timer fires cancels it;
//! otherwise the runtime's listener is told about the rejection exactly once.

use crate::promise::{Promise, SettlementId};
use crate::runtime::Runtime;
use crate::task_queue::TimerId;
use core_types::Value;
use std::fmt;

/// A rejection that stayed unobserved for the whole grace period.
#[derive(Clone)]
pub struct UnhandledRejection {
    /// The rejection reason
    pub reason: Value,
    /// The promise that was rejected
    pub promise: Promise,
}

impl fmt::Debug for UnhandledRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnhandledRejection")
            .field("reason", &self.reason)
            .field("promise", &self.promise.id())
            .finish()
    }
}

pub(crate) fn track(promise: &Promise) {
    let runtime = promise.runtime();
    let grace_ms = runtime.unhandled_grace_ms();
    let target = promise.clone();
    let timer = runtime.event_loop().set_timeout(grace_ms, move || report(target));
    promise.set_unhandled_timer(timer);
    tracing::trace!(
        event = "promise.unhandled.arm",
        id = promise.id(),
        timer,
        grace_ms,
        "Unobserved rejection"
    );
}

pub(crate) fn cancel(runtime: &Runtime, id: SettlementId, timer: TimerId) {
    runtime.event_loop().clear_timeout(timer);
    tracing::trace!(
        event = "promise.unhandled.cancel",
        id,
        timer,
        "Rejection observed within grace period"
    );
}

fn report(promise: Promise) {
    promise.clear_unhandled_timer();
    if promise.is_handled() {
        return;
    }
    let Some(Err(reason)) = promise.outcome() else {
        return;
    };
    let runtime = promise.runtime();
    runtime.notify_unhandled(&UnhandledRejection { reason, promise });
}
