//! Outcome taps for fallible futures.

use std::future::Future;

/// Extension methods on any `Future<Output = Result<T, E>>`.
///
/// Each method observes the outcome and then yields it unchanged.
pub trait SettleExt<T, E>: Future<Output = Result<T, E>> + Sized {
    /// Hand the outcome to `cb` by reference.
    fn callback<F>(self, cb: F) -> impl Future<Output = Result<T, E>>
    where
        F: FnOnce(Result<&T, &E>);

    /// Like [`SettleExt::callback`] but only the error, if any, is reported.
    fn callback_no_return<F>(self, cb: F) -> impl Future<Output = Result<T, E>>
    where
        F: FnOnce(Option<&E>);

    /// Await `f()` after the future settles either way.
    fn finally<F, Fin>(self, f: F) -> impl Future<Output = Result<T, E>>
    where
        F: FnOnce() -> Fin,
        Fin: Future<Output = ()>;
}

impl<Fut, T, E> SettleExt<T, E> for Fut
where
    Fut: Future<Output = Result<T, E>>,
{
    fn callback<F>(self, cb: F) -> impl Future<Output = Result<T, E>>
    where
        F: FnOnce(Result<&T, &E>),
    {
        async move {
            let outcome = self.await;
            cb(outcome.as_ref());
            outcome
        }
    }

    fn callback_no_return<F>(self, cb: F) -> impl Future<Output = Result<T, E>>
    where
        F: FnOnce(Option<&E>),
    {
        async move {
            let outcome = self.await;
            cb(outcome.as_ref().err());
            outcome
        }
    }

    fn finally<F, Fin>(self, f: F) -> impl Future<Output = Result<T, E>>
    where
        F: FnOnce() -> Fin,
        Fin: Future<Output = ()>,
    {
        async move {
            let outcome = self.await;
            f().await;
            outcome
        }
    }
}
