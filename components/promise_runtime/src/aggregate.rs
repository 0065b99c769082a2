//! Combinators over lists of values.
//!
//! Inputs are plain [`Value`]s: anything tagged as a thenable is subscribed to,
//! everything else counts as already fulfilled. Results keep input order no
//! matter in which order the inputs settle.

use crate::flavor::Flavor;
use crate::promise::Promise;
use core_types::{Handler, JsError, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Result slots plus the number of inputs still outstanding.
///
/// `remaining` starts at one so the scan itself holds the collector open;
/// thenables that settle synchronously during the scan can never complete it
/// early.
struct Collector {
    slots: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
}

impl Collector {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![Value::Undefined; len]),
            remaining: Cell::new(1),
        })
    }

    fn expect_one(&self) {
        self.remaining.set(self.remaining.get() + 1);
    }

    fn set(&self, index: usize, value: Value) {
        self.slots.borrow_mut()[index] = value;
    }

    /// Returns true when the last outstanding input completed.
    fn complete_one(&self) -> bool {
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        remaining == 0
    }

    fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.slots.borrow_mut())
    }
}

fn fulfilled_record(value: Value) -> Value {
    Value::record(vec![("status", Value::from("fulfilled")), ("value", value)])
}

fn rejected_record(reason: Value) -> Value {
    Value::record(vec![("status", Value::from("rejected")), ("reason", reason)])
}

impl Flavor {
    /// Resolves with every input's value, in input order.
    ///
    /// Rejects with the first rejection to happen. With no thenable inputs the
    /// result resolves before this call returns.
    pub fn all(&self, inputs: Vec<Value>) -> Promise {
        self.create(move |resolve, reject| {
            let collector = Collector::new(inputs.len());
            for (index, input) in inputs.into_iter().enumerate() {
                let thenable = match input {
                    Value::Thenable(thenable) => thenable,
                    value => {
                        collector.set(index, value);
                        continue;
                    }
                };
                collector.expect_one();
                let (c, res, rej) = (collector.clone(), resolve.clone(), reject.clone());
                thenable.then(
                    Some(Handler::infallible(move |value| {
                        c.set(index, value);
                        if c.complete_one() {
                            res.resolve(c.take());
                        }
                        Value::Undefined
                    })),
                    Some(Handler::infallible(move |reason| {
                        rej.reject(reason);
                        Value::Undefined
                    })),
                )?;
            }
            if collector.complete_one() {
                resolve.resolve(collector.take());
            }
            Ok(())
        })
    }

    /// Resolves once every input settled, with one status record per input.
    ///
    /// Never rejects. Each record is `{status: "fulfilled", value}` or
    /// `{status: "rejected", reason}`.
    pub fn all_settled(&self, inputs: Vec<Value>) -> Promise {
        self.create(move |resolve, _| {
            let collector = Collector::new(inputs.len());
            for (index, input) in inputs.into_iter().enumerate() {
                let thenable = match input {
                    Value::Thenable(thenable) => thenable,
                    value => {
                        collector.set(index, fulfilled_record(value));
                        continue;
                    }
                };
                collector.expect_one();
                let (c, res) = (collector.clone(), resolve.clone());
                let (c2, res2) = (collector.clone(), resolve.clone());
                let subscribed = thenable.then(
                    Some(Handler::infallible(move |value| {
                        c.set(index, fulfilled_record(value));
                        if c.complete_one() {
                            res.resolve(c.take());
                        }
                        Value::Undefined
                    })),
                    Some(Handler::infallible(move |reason| {
                        c2.set(index, rejected_record(reason));
                        if c2.complete_one() {
                            res2.resolve(c2.take());
                        }
                        Value::Undefined
                    })),
                );
                if let Err(reason) = subscribed {
                    collector.set(index, rejected_record(reason));
                    collector.complete_one();
                }
            }
            if collector.complete_one() {
                resolve.resolve(collector.take());
            }
            Ok(())
        })
    }

    /// Settles like the first input to settle.
    ///
    /// A non-thenable input wins as soon as the scan reaches it. An empty
    /// input list never settles.
    pub fn race(&self, inputs: Vec<Value>) -> Promise {
        self.create(move |resolve, reject| {
            for input in inputs {
                let thenable = match input {
                    Value::Thenable(thenable) => thenable,
                    value => {
                        resolve.resolve(value);
                        continue;
                    }
                };
                let (res, rej) = (resolve.clone(), reject.clone());
                thenable.then(
                    Some(Handler::infallible(move |value| {
                        res.resolve(value);
                        Value::Undefined
                    })),
                    Some(Handler::infallible(move |reason| {
                        rej.reject(reason);
                        Value::Undefined
                    })),
                )?;
            }
            Ok(())
        })
    }

    /// Resolves with the first fulfillment.
    ///
    /// Rejects with an `AggregateError` holding every reason, in input order,
    /// once all inputs rejected. An empty input list rejects immediately.
    pub fn any(&self, inputs: Vec<Value>) -> Promise {
        self.create(move |resolve, reject| {
            let collector = Collector::new(inputs.len());
            for (index, input) in inputs.into_iter().enumerate() {
                let thenable = match input {
                    Value::Thenable(thenable) => thenable,
                    value => {
                        resolve.resolve(value);
                        continue;
                    }
                };
                collector.expect_one();
                let (c, res, rej) = (collector.clone(), resolve.clone(), reject.clone());
                thenable.then(
                    Some(Handler::infallible(move |value| {
                        res.resolve(value);
                        Value::Undefined
                    })),
                    Some(Handler::infallible(move |reason| {
                        c.set(index, reason);
                        if c.complete_one() {
                            rej.reject(JsError::aggregate("All promises were rejected", c.take()));
                        }
                        Value::Undefined
                    })),
                )?;
            }
            if collector.complete_one() {
                reject.reject(JsError::aggregate("All promises were rejected", collector.take()));
            }
            Ok(())
        })
    }

    /// Settles `ms` milliseconds from now on a host timer.
    ///
    /// Resolves with `resolve_with` when given, otherwise rejects with a
    /// `TimeoutError`.
    pub fn timeout(&self, ms: u64, resolve_with: Option<Value>) -> Promise {
        let event_loop = self.runtime().event_loop().clone();
        self.create(move |resolve, reject| {
            event_loop.set_timeout(ms, move || match resolve_with {
                Some(value) => resolve.resolve(value),
                None => reject.reject(JsError::timeout(format!("Timed out after {}ms", ms))),
            });
            Ok(())
        })
    }
}
