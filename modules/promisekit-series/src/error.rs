//! Typed errors for the future helpers.

use thiserror::Error;

/// Outcome of an adapted callback-style call that did not resolve.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdaptError<E> {
    /// The wrapped function reported an error through its callback,
    /// or a custom strategy rejected.
    #[error("callback rejected: {0:?}")]
    Rejected(E),

    /// The callback (or the settler handed to a custom strategy) was
    /// dropped without ever settling.
    #[error("callback dropped without settling")]
    Abandoned,
}

/// Outcome seen by a caller of a debounced function that did not succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DebounceError<E> {
    /// The coalesced invocation failed. Every caller in the window sees it.
    #[error("debounced call failed: {0:?}")]
    Failed(E),

    /// The debouncer went away before its timer fired.
    #[error("debounced call cancelled before it ran")]
    Cancelled,
}

/// Positional failures from `all_catch`. `None` marks a future that succeeded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{} of {} futures failed", self.failures(), self.errors.len())]
pub struct AllCatchError<E> {
    pub errors: Vec<Option<E>>,
}

impl<E> AllCatchError<E> {
    /// Number of futures that failed.
    pub fn failures(&self) -> usize {
        self.errors.iter().filter(|e| e.is_some()).count()
    }
}

/// A failed `assert_true` / `assert_null` check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AssertionError {
    pub message: String,
}

impl AssertionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
