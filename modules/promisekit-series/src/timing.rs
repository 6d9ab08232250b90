//! Timer-driven helpers: `delay` and trailing-edge `debounce`.
//!
//! Both need a Tokio runtime with the time driver enabled.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::debug;

use crate::error::DebounceError;

/// Resolve after `duration` has elapsed.
pub async fn delay(duration: Duration) {
    tokio::time::sleep(duration).await;
}

// ---------------------------------------------------------------------------
// Debounced
// ---------------------------------------------------------------------------

type DebouncedFn<A, T, E> = dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync;
type Waiter<T, E> = oneshot::Sender<Result<T, DebounceError<E>>>;

/// A function whose calls coalesce.
///
/// Calls arriving less than `wait` apart share one invocation of the wrapped
/// function, made `wait` after the last of them with that last call's
/// arguments. Every caller in the window receives the invocation's outcome.
pub struct Debounced<A, T, E> {
    inner: Arc<DebounceInner<A, T, E>>,
}

struct DebounceInner<A, T, E> {
    f: Box<DebouncedFn<A, T, E>>,
    wait: Duration,
    state: Mutex<DebounceState<A, T, E>>,
}

struct DebounceState<A, T, E> {
    /// When the current window closes. Every call pushes it back.
    deadline: Instant,
    /// Whether a timer task is watching `deadline`. At most one per window.
    armed: bool,
    latest: Option<A>,
    waiters: Vec<Waiter<T, E>>,
}

/// Wrap `f` so that bursts of calls within `wait` collapse into one.
pub fn debounce<A, T, E, F, Fut>(f: F, wait: Duration) -> Debounced<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let f: Box<DebouncedFn<A, T, E>> = Box::new(move |args| Box::pin(f(args)));
    Debounced {
        inner: Arc::new(DebounceInner {
            f,
            wait,
            state: Mutex::new(DebounceState {
                deadline: Instant::now(),
                armed: false,
                latest: None,
                waiters: Vec::new(),
            }),
        }),
    }
}

impl<A, T, E> Debounced<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Register a call and (re)arm the timer.
    ///
    /// Must be called from within a Tokio runtime. Dropping the `Debounced`
    /// before the timer fires resolves every pending call with
    /// [`DebounceError::Cancelled`].
    pub fn call(&self, args: A) -> DebouncedCall<T, E> {
        let (tx, rx) = oneshot::channel();

        let needs_timer = {
            let mut state = lock(&self.inner.state);
            state.deadline = Instant::now() + self.inner.wait;
            state.latest = Some(args);
            state.waiters.push(tx);
            !std::mem::replace(&mut state.armed, true)
        };

        if needs_timer {
            tokio::spawn(fire(Arc::downgrade(&self.inner)));
        }

        DebouncedCall { rx }
    }

    pub fn wait(&self) -> Duration {
        self.inner.wait
    }

    /// Calls waiting on the next invocation.
    pub fn pending(&self) -> usize {
        lock(&self.inner.state).waiters.len()
    }
}

impl<A, T, E> fmt::Debug for Debounced<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounced")
            .field("wait", &self.inner.wait)
            .finish_non_exhaustive()
    }
}

/// Sleep until the window closes, following the deadline as later calls
/// push it back, then run the wrapped function once.
async fn fire<A, T, E>(weak: Weak<DebounceInner<A, T, E>>)
where
    T: Clone,
    E: Clone,
{
    let (inner, args, waiters) = loop {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let deadline = lock(&inner.state).deadline;
        // Sleep without a strong reference so dropping the debouncer cancels.
        drop(inner);

        tokio::time::sleep_until(deadline).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut state = lock(&inner.state);
        if state.deadline > Instant::now() {
            continue;
        }
        state.armed = false;
        let Some(args) = state.latest.take() else {
            return;
        };
        let waiters = std::mem::take(&mut state.waiters);
        drop(state);
        break (inner, args, waiters);
    };

    debug!(callers = waiters.len(), "debounce: running coalesced call");
    let outcome = (inner.f)(args).await.map_err(DebounceError::Failed);

    for waiter in waiters {
        // A caller that dropped its future no longer cares.
        let _ = waiter.send(outcome.clone());
    }
}

fn lock<S>(mutex: &Mutex<S>) -> MutexGuard<'_, S> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Future returned by [`Debounced::call`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct DebouncedCall<T, E> {
    rx: oneshot::Receiver<Result<T, DebounceError<E>>>,
}

impl<T, E> Future for DebouncedCall<T, E> {
    type Output = Result<T, DebounceError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Err(DebounceError::Cancelled),
        };
        Poll::Ready(outcome)
    }
}
