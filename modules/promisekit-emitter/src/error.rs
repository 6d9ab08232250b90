//! Typed errors for event dispatch.

use thiserror::Error;

/// A dispatch that did not complete.
///
/// Lookup misses are never errors: an event without listeners resolves to
/// the neutral result of the dispatch mode.
#[derive(Debug, Error)]
pub enum EmitError {
    /// A listener failed. Listeners after it were not invoked.
    #[error("listener #{index} for event '{event}' failed: {source}")]
    Listener {
        event: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl EmitError {
    /// The event whose dispatch failed.
    pub fn event(&self) -> &str {
        match self {
            EmitError::Listener { event, .. } => event,
        }
    }

    /// Position (after ordering) of the listener that failed.
    pub fn index(&self) -> usize {
        match self {
            EmitError::Listener { index, .. } => *index,
        }
    }
}

/// Result type alias for dispatch operations.
pub type EmitResult<T> = std::result::Result<T, EmitError>;
