//! Error types carried by rejected deferred values.
//!
//! A rejection reason is an arbitrary [`Value`]; the runtime itself only ever
//! produces [`JsError`] reasons, wrapped as [`Value::Error`].

use crate::Value;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// The kind of error.
///
/// The first group mirrors JavaScript's built-in error constructors; the rest
/// are produced by the promise runtime and the task scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Type error (e.g. a promise resolved with itself)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// Internal engine error
    InternalError,
    /// A deadline elapsed before the work settled
    TimeoutError,
    /// Work was abandoned by its owner (stale eviction)
    AbortError,
    /// Every input of an `any` combinator rejected
    AggregateError,
}

impl ErrorKind {
    /// Returns the constructor-style name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::InternalError => "InternalError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::AbortError => "AbortError",
            ErrorKind::AggregateError => "AggregateError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error value with a kind and message.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError};
///
/// let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
/// assert_eq!(error.message, "undefined is not a function");
/// assert_eq!(error.to_string(), "TypeError: undefined is not a function");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Nested reasons, only populated for [`ErrorKind::AggregateError`]
    pub errors: Vec<Value>,
}

impl JsError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates a `TimeoutError`.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimeoutError, message)
    }

    /// Creates an `AbortError`.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AbortError, message)
    }

    /// Creates an `InternalError` from a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic>".to_string());
        Self::new(ErrorKind::InternalError, message)
    }

    /// Creates an `AggregateError` holding every rejection reason in input order.
    pub fn aggregate(message: impl Into<String>, errors: Vec<Value>) -> Self {
        Self {
            kind: ErrorKind::AggregateError,
            message: message.into(),
            errors,
        }
    }
}
