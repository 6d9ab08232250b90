//! Bridging callback-style functions into futures.
//!
//! A callback-style function takes its arguments plus a [`Callback`] and
//! reports its outcome by calling it exactly once. [`adapt`] turns such a
//! function into one that returns a future of that outcome.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::channel::oneshot;
use futures::future::{self, Ready};
use tracing::trace;

use crate::error::AdaptError;

/// An already-settled future built from an `(error, data)` pair.
pub fn from_callback<T, E>(err: Option<E>, data: T) -> Ready<Result<T, E>> {
    match err {
        Some(err) => future::ready(Err(err)),
        None => future::ready(Ok(data)),
    }
}

// ---------------------------------------------------------------------------
// Settler
// ---------------------------------------------------------------------------

/// The resolve/reject pair of one pending adapted call.
///
/// Consumed by whichever of `resolve` or `reject` runs first. Dropping it
/// unsettled surfaces as [`AdaptError::Abandoned`].
pub struct Settler<T, E> {
    tx: oneshot::Sender<Result<T, E>>,
}

impl<T, E> Settler<T, E> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, err: E) {
        self.settle(Err(err));
    }

    fn settle(self, outcome: Result<T, E>) {
        if self.tx.send(outcome).is_err() {
            trace!("adapted call settled after its future was dropped");
        }
    }
}

impl<T, E> fmt::Debug for Settler<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("canceled", &self.tx.is_canceled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CallbackStrategy
// ---------------------------------------------------------------------------

type CustomHandler<T, E> = dyn Fn(Result<T, E>, Settler<T, E>) + Send + Sync;

/// How a callback outcome is turned into a settled future.
pub enum CallbackStrategy<T, E> {
    /// Errors reject, values resolve.
    Default,
    /// The handler sees the raw outcome and must settle through the
    /// [`Settler`] itself.
    Custom(Arc<CustomHandler<T, E>>),
}

impl<T, E> CallbackStrategy<T, E> {
    pub fn custom<H>(handler: H) -> Self
    where
        H: Fn(Result<T, E>, Settler<T, E>) + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(handler))
    }
}

impl<T, E> Default for CallbackStrategy<T, E> {
    fn default() -> Self {
        Self::Default
    }
}

impl<T, E> Clone for CallbackStrategy<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Default => Self::Default,
            Self::Custom(handler) => Self::Custom(Arc::clone(handler)),
        }
    }
}

impl<T, E> fmt::Debug for CallbackStrategy<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

/// The trailing callback handed to a callback-style function.
pub struct Callback<T, E> {
    settler: Settler<T, E>,
    strategy: CallbackStrategy<T, E>,
}

impl<T, E> Callback<T, E> {
    /// Report the outcome. Routed through the adaptation's strategy.
    pub fn done(self, outcome: Result<T, E>) {
        match self.strategy {
            CallbackStrategy::Default => match outcome {
                Ok(value) => self.settler.resolve(value),
                Err(err) => self.settler.reject(err),
            },
            CallbackStrategy::Custom(handler) => handler(outcome, self.settler),
        }
    }

    pub fn ok(self, value: T) {
        self.done(Ok(value));
    }

    pub fn err(self, err: E) {
        self.done(Err(err));
    }
}

impl<T, E> fmt::Debug for Callback<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// adapt
// ---------------------------------------------------------------------------

/// Future returned by an adapted function.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Adapted<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Future for Adapted<T, E> {
    type Output = Result<T, AdaptError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(AdaptError::Rejected(err)),
            Err(oneshot::Canceled) => Err(AdaptError::Abandoned),
        };
        Poll::Ready(outcome)
    }
}

/// Turn a callback-style function into a future-returning one.
///
/// `wrapped` runs synchronously inside the returned function, receiving the
/// call's arguments and a fresh [`Callback`]. Any context it needs is
/// captured by the closure itself.
pub fn adapt<A, T, E, F>(
    wrapped: F,
    strategy: CallbackStrategy<T, E>,
) -> impl Fn(A) -> Adapted<T, E>
where
    F: Fn(A, Callback<T, E>),
{
    move |args| {
        let (tx, rx) = oneshot::channel();
        let callback = Callback {
            settler: Settler { tx },
            strategy: strategy.clone(),
        };
        wrapped(args, callback);
        Adapted { rx }
    }
}
