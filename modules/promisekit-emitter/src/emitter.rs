//! The dispatch surface.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use promisekit_series::each_series;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EmitterConfig;
use crate::error::{EmitError, EmitResult};
use crate::registry::{Registry, SharedListener};
use crate::traits::{FnListener, Listener, Truthy};
use crate::types::{ListenerId, ListenerOptions};

/// Prioritized async event emitter.
///
/// Register listeners per event name, then dispatch in one of three modes:
/// collect everything (`emit`), stop at the first truthy result (`emit_or`),
/// or stop at the first falsy one (`emit_and`). Listeners always run one at a
/// time, `Normal` ones in registration order followed by `Last` ones.
///
/// Cloning is cheap and clones share a registry. Separately constructed
/// emitters never share listeners. A listener that needs the emitter itself
/// captures a [`WeakEmitter`] from [`downgrade`](Self::downgrade); capturing
/// a clone would keep the emitter and its listeners alive forever.
pub struct AsyncEventEmitter<A = Vec<Value>, T = Value> {
    inner: Arc<EmitterInner<A, T>>,
}

struct EmitterInner<A, T> {
    registry: Mutex<Registry<A, T>>,
    next_id: AtomicU64,
    config: EmitterConfig,
}

impl<A, T> EmitterInner<A, T> {
    fn registry(&self) -> MutexGuard<'_, Registry<A, T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, event: &str) -> Vec<SharedListener<A, T>> {
        self.registry().snapshot(event)
    }
}

impl<A, T> AsyncEventEmitter<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self::with_config(EmitterConfig::default())
    }

    pub fn with_config(config: EmitterConfig) -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                registry: Mutex::new(Registry::new()),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.inner.config
    }

    /// A handle that does not keep the emitter alive. Use it to reach the
    /// emitter from inside its own listeners.
    pub fn downgrade(&self) -> WeakEmitter<A, T> {
        WeakEmitter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register `f` for `event` with default options.
    pub fn on<F, Fut>(&self, event: impl Into<String>, f: F) -> ListenerHandle<A, T>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.on_with(event, ListenerOptions::default(), f)
    }

    /// Register `f` for `event`, placed according to `options.order`.
    pub fn on_with<F, Fut>(
        &self,
        event: impl Into<String>,
        options: ListenerOptions,
        f: F,
    ) -> ListenerHandle<A, T>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.subscribe(event, options, FnListener::new(f))
    }

    /// Register a [`Listener`] implementation.
    pub fn subscribe<L>(
        &self,
        event: impl Into<String>,
        options: ListenerOptions,
        listener: L,
    ) -> ListenerHandle<A, T>
    where
        L: Listener<A, T> + 'static,
    {
        let event = event.into();
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));

        self.inner
            .registry()
            .insert(&event, id, options.order, Arc::new(listener));

        debug!(
            emitter = %self.inner.config.label,
            event = %event,
            %id,
            order = ?options.order,
            "Listener registered"
        );

        ListenerHandle {
            emitter: Arc::downgrade(&self.inner),
            event,
            id,
        }
    }

    /// Remove every listener of each named event.
    pub fn clear<I, S>(&self, events: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = self.inner.registry();
        for event in events {
            let event = event.as_ref();
            let removed = registry.clear(event);
            debug!(emitter = %self.inner.config.label, event, removed, "Event cleared");
        }
    }

    /// Remove every listener of every event.
    pub fn clear_all(&self) {
        let removed = self.inner.registry().clear_all();
        debug!(emitter = %self.inner.config.label, removed, "All events cleared");
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.registry().len(event)
    }

    /// Events that currently have at least one listener, sorted.
    pub fn event_names(&self) -> Vec<String> {
        self.inner.registry().event_names()
    }

    /// Registration ids of `event` in dispatch order.
    pub fn listener_ids(&self, event: &str) -> Vec<ListenerId> {
        self.inner.registry().ids(event)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Run every listener of `event` in order and collect their results.
    ///
    /// Resolves to an empty `Vec` when nothing is registered. The first
    /// listener failure ends the dispatch and is returned; the listeners
    /// after it are not invoked.
    pub async fn emit(&self, event: &str, args: A) -> EmitResult<Vec<T>> {
        let listeners = self.inner.snapshot(event);
        self.log_dispatch(event, "chain", listeners.len());

        let args = &args;
        let results = each_series(listeners.iter().enumerate(), move |(index, listener)| {
            self.invoke(event, index, listener.as_ref(), args.clone())
        })
        .await?;

        self.log_complete(event, "chain", results.len());
        Ok(results)
    }

    async fn invoke(
        &self,
        event: &str,
        index: usize,
        listener: &dyn Listener<A, T>,
        args: A,
    ) -> EmitResult<T> {
        let started = Instant::now();
        let outcome = listener.call(args).await;
        let elapsed = started.elapsed();

        if let Some(threshold) = self.inner.config.slow_listener_threshold {
            if elapsed > threshold {
                warn!(
                    emitter = %self.inner.config.label,
                    event,
                    index,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Slow listener"
                );
            }
        }

        outcome.map_err(|source| {
            warn!(
                emitter = %self.inner.config.label,
                event,
                index,
                error = %source,
                "Listener failed"
            );
            EmitError::Listener {
                event: event.to_string(),
                index,
                source,
            }
        })
    }

    fn log_dispatch(&self, event: &str, mode: &'static str, listeners: usize) {
        let label = &self.inner.config.label;
        if self.inner.config.trace_dispatch {
            info!(emitter = %label, event, mode, listeners, "Dispatching");
        } else {
            debug!(emitter = %label, event, mode, listeners, "Dispatching");
        }
    }

    fn log_complete(&self, event: &str, mode: &'static str, invoked: usize) {
        let label = &self.inner.config.label;
        if self.inner.config.trace_dispatch {
            info!(emitter = %label, event, mode, invoked, "Dispatch complete");
        } else {
            debug!(emitter = %label, event, mode, invoked, "Dispatch complete");
        }
    }
}

impl<A, T> AsyncEventEmitter<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Truthy + Send + 'static,
{
    /// Run listeners in order until one returns a truthy result.
    ///
    /// Resolves to that result, otherwise to the last listener's result
    /// (`T::falsy()` when nothing is registered).
    pub async fn emit_or(&self, event: &str, args: A) -> EmitResult<T> {
        self.reduce_until(event, args, "or", T::falsy()).await
    }

    /// Run listeners in order until one returns a falsy result.
    ///
    /// Resolves to that result, otherwise to the last listener's result
    /// (`T::truthy()` when nothing is registered).
    pub async fn emit_and(&self, event: &str, args: A) -> EmitResult<T> {
        self.reduce_until(event, args, "and", T::truthy()).await
    }

    /// Fold over the listeners, stopping as soon as the accumulator's
    /// truthiness differs from the initial value's.
    async fn reduce_until(
        &self,
        event: &str,
        args: A,
        mode: &'static str,
        initial: T,
    ) -> EmitResult<T> {
        let listeners = self.inner.snapshot(event);
        self.log_dispatch(event, mode, listeners.len());

        let neutral = initial.is_truthy();
        let mut acc = initial;
        let mut invoked = 0;
        for (index, listener) in listeners.iter().enumerate() {
            if acc.is_truthy() != neutral {
                debug!(
                    emitter = %self.inner.config.label,
                    event,
                    mode,
                    skipped = listeners.len() - index,
                    "Dispatch short-circuited"
                );
                break;
            }
            acc = self
                .invoke(event, index, listener.as_ref(), args.clone())
                .await?;
            invoked += 1;
        }

        self.log_complete(event, mode, invoked);
        Ok(acc)
    }
}

impl<A, T> Default for AsyncEventEmitter<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T> Clone for AsyncEventEmitter<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T> fmt::Debug for AsyncEventEmitter<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncEventEmitter")
            .field("label", &self.inner.config.label)
            .field("events", &self.inner.registry().event_names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// WeakEmitter
// ---------------------------------------------------------------------------

/// Non-owning reference to an [`AsyncEventEmitter`].
pub struct WeakEmitter<A, T> {
    inner: Weak<EmitterInner<A, T>>,
}

impl<A, T> WeakEmitter<A, T> {
    /// The emitter, or `None` once every strong handle has been dropped.
    pub fn upgrade(&self) -> Option<AsyncEventEmitter<A, T>> {
        self.inner.upgrade().map(|inner| AsyncEventEmitter { inner })
    }
}

impl<A, T> Clone for WeakEmitter<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<A, T> fmt::Debug for WeakEmitter<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEmitter")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ListenerHandle
// ---------------------------------------------------------------------------

/// Returned by every registration; removes exactly that registration.
///
/// Holds the emitter weakly, so keeping a handle around does not keep the
/// emitter alive.
pub struct ListenerHandle<A, T> {
    emitter: Weak<EmitterInner<A, T>>,
    event: String,
    id: ListenerId,
}

impl<A, T> ListenerHandle<A, T> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Unregister. Returns `false` if the listener was already removed (by an
    /// earlier call, a `clear`, or because the emitter is gone).
    ///
    /// Dispatches already in flight keep running on their own snapshot; the
    /// removal applies from the next dispatch on.
    pub fn remove(&self) -> bool {
        let Some(inner) = self.emitter.upgrade() else {
            return false;
        };
        let removed = inner.registry().remove(&self.event, self.id);
        debug!(
            emitter = %inner.config.label,
            event = %self.event,
            id = %self.id,
            removed,
            "Listener removed"
        );
        removed
    }
}

impl<A, T> fmt::Debug for ListenerHandle<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}
