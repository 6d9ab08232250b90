//! Registration types: listener options and identities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a listener runs relative to the others on the same event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Registration order, ahead of every `Last` listener.
    #[default]
    Normal,
    /// After all `Normal` listeners, in registration order among themselves.
    Last,
}

/// Per-registration options. `ListenerOptions::default()` applies no ordering
/// preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerOptions {
    pub order: Order,
}

impl ListenerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for options that push the listener to the end.
    pub fn last() -> Self {
        Self { order: Order::Last }
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }
}

/// Identity of a single registration. Registering the same function twice
/// yields two ids, each removable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}
