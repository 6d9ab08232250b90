//! Listener storage.
//!
//! Each event keeps two buckets: `normal` listeners in registration order,
//! then `last` listeners in registration order. Dispatch order is the
//! concatenation, which is exactly a stable partition on the order tag.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::Listener;
use crate::types::{ListenerId, Order};

pub(crate) type SharedListener<A, T> = Arc<dyn Listener<A, T>>;

struct Entry<A, T> {
    id: ListenerId,
    listener: SharedListener<A, T>,
}

struct ListenerList<A, T> {
    normal: Vec<Entry<A, T>>,
    last: Vec<Entry<A, T>>,
}

impl<A, T> ListenerList<A, T> {
    fn new() -> Self {
        Self {
            normal: Vec::new(),
            last: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.normal.len() + self.last.len()
    }

    fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.last.is_empty()
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        for bucket in [&mut self.normal, &mut self.last] {
            if let Some(pos) = bucket.iter().position(|e| e.id == id) {
                bucket.remove(pos);
                return true;
            }
        }
        false
    }

    fn ordered(&self) -> impl Iterator<Item = &Entry<A, T>> {
        self.normal.iter().chain(self.last.iter())
    }
}

/// Event name → ordered listeners. Owned by exactly one emitter.
pub(crate) struct Registry<A, T> {
    events: HashMap<String, ListenerList<A, T>>,
}

impl<A, T> Registry<A, T> {
    pub(crate) fn new() -> Self {
        Self {
            events: HashMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        event: &str,
        id: ListenerId,
        order: Order,
        listener: SharedListener<A, T>,
    ) {
        let list = self
            .events
            .entry(event.to_string())
            .or_insert_with(ListenerList::new);
        let entry = Entry { id, listener };
        match order {
            Order::Normal => list.normal.push(entry),
            Order::Last => list.last.push(entry),
        }
    }

    /// Remove one registration. `false` if it is already gone.
    pub(crate) fn remove(&mut self, event: &str, id: ListenerId) -> bool {
        let Some(list) = self.events.get_mut(event) else {
            return false;
        };
        let removed = list.remove(id);
        if list.is_empty() {
            self.events.remove(event);
        }
        removed
    }

    /// Drop every listener of `event`. Returns how many were removed.
    pub(crate) fn clear(&mut self, event: &str) -> usize {
        self.events.remove(event).map_or(0, |list| list.len())
    }

    pub(crate) fn clear_all(&mut self) -> usize {
        let removed = self.events.values().map(ListenerList::len).sum();
        self.events.clear();
        removed
    }

    /// Listeners of `event` in dispatch order. Dispatch runs on this copy,
    /// so later registry mutations never affect an in-flight dispatch.
    pub(crate) fn snapshot(&self, event: &str) -> Vec<SharedListener<A, T>> {
        self.events
            .get(event)
            .map(|list| list.ordered().map(|e| Arc::clone(&e.listener)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn ids(&self, event: &str) -> Vec<ListenerId> {
        self.events
            .get(event)
            .map(|list| list.ordered().map(|e| e.id).collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self, event: &str) -> usize {
        self.events.get(event).map_or(0, ListenerList::len)
    }

    pub(crate) fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.events.keys().cloned().collect();
        names.sort();
        names
    }
}
