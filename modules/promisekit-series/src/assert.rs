//! Assertions that report through a future instead of panicking.

use std::fmt::Display;

use futures::future::{self, Ready};

use crate::error::AssertionError;

/// Rejects with `msg` unless `expr` holds.
pub fn assert_true(expr: bool, msg: impl Into<String>) -> Ready<Result<(), AssertionError>> {
    if expr {
        future::ready(Ok(()))
    } else {
        future::ready(Err(AssertionError::new(msg)))
    }
}

/// Rejects when `value` is present. The message is the value followed by `msg`.
pub fn assert_null<V: Display>(value: Option<V>, msg: &str) -> Ready<Result<(), AssertionError>> {
    match value {
        None => future::ready(Ok(())),
        Some(value) => future::ready(Err(AssertionError::new(format!("{value}{msg}")))),
    }
}
