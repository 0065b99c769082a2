//! Promise debugging support.
//!
//! Enabled per runtime with
//! [`Runtime::set_promise_debug_state`](crate::Runtime::set_promise_debug_state).
//! While enabled every state transition produces a [`DebugEvent`] and
//! [`Promise::debug_info`](crate::Promise::debug_info) exposes internal state.
//! Nothing here changes how promises behave.

use crate::config::FlavorKind;
use crate::promise::{PromiseState, SettlementId};
use core_types::Value;
use serde::Serialize;
use std::rc::Rc;

/// Receives every transition while debugging is enabled.
pub type DebugLogger = Rc<dyn Fn(&DebugEvent)>;

/// One settlement state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugEvent {
    /// Settlement that changed state
    pub id: SettlementId,
    /// Settlement being resolved when this one was created
    pub parent: Option<SettlementId>,
    /// Flavor the settlement is bound to
    pub flavor: FlavorKind,
    /// State before the transition
    pub from: PromiseState,
    /// State after the transition
    pub to: PromiseState,
    /// Display form of the value or reason, when there is one
    pub detail: Option<String>,
    /// Whether any continuation had been attached at this point
    pub handled: bool,
}

/// Snapshot of a settlement's internals.
#[derive(Debug, Clone, PartialEq)]
pub struct PromiseDebugInfo {
    /// Settlement id
    pub id: SettlementId,
    /// Parent settlement id
    pub parent: Option<SettlementId>,
    /// Flavor the settlement is bound to
    pub flavor: FlavorKind,
    /// Current state
    pub state: PromiseState,
    /// Settled value or reason
    pub result: Option<Value>,
    /// Whether a continuation has been attached
    pub handled: bool,
    /// Continuations waiting for settlement
    pub pending_reactions: usize,
}

#[derive(Clone, Default)]
pub(crate) struct DebugState {
    pub(crate) enabled: bool,
    pub(crate) logger: Option<DebugLogger>,
}

impl DebugState {
    pub(crate) fn emit(&self, event: &DebugEvent) {
        match &self.logger {
            Some(logger) => logger(event),
            None => tracing::debug!(
                event = "promise.debug.transition",
                id = event.id,
                parent = ?event.parent,
                flavor = %event.flavor,
                from = %event.from,
                to = %event.to,
                detail = ?event.detail,
                handled = event.handled,
                "Promise state transition"
            ),
        }
    }
}
