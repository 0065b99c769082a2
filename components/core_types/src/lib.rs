//! Core value and error types shared by the deferred-value runtime.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of settled values and rejection reasons
//! - [`Thenable`] - The "has a then-like method" capability
//! - [`Handler`] / [`Completion`] - One-shot continuation handlers and their outcome
//! - [`JsError`] - Errors produced by the runtime
//! - [`ErrorKind`] - Types of errors
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(!num.is_thenable());
//!
//! let reason = Value::from(JsError::new(ErrorKind::TypeError, "not a function"));
//! assert_eq!(reason.as_error().map(|e| e.kind), Some(ErrorKind::TypeError));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod thenable;
mod value;

pub use error::{ErrorKind, JsError};
pub use thenable::{Completion, Handler, Thenable};
pub use value::Value;
