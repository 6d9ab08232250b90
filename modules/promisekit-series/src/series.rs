//! Sequential and fan-out combinators.
//!
//! `each_series` is the chaining primitive the event emitter dispatches
//! through. `all_catch` is its concurrent counterpart that waits for every
//! future before reporting failures.

use std::future::Future;

use futures::future::join_all;
use tracing::trace;

use crate::error::AllCatchError;

// ---------------------------------------------------------------------------
// each_series
// ---------------------------------------------------------------------------

/// Run `f` over `items` one at a time, in input order.
///
/// `f` is invoked for item *i+1* only once the future returned for item *i*
/// has settled. Results land at the position of the item that produced them,
/// so the output order is the input order regardless of how long each unit
/// took. The first error ends the chain: later items are never invoked.
///
/// An empty input resolves immediately with an empty `Vec`. `items` may be
/// unbounded as long as some unit fails.
pub async fn each_series<I, F, Fut, T, E>(items: I, mut f: F) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut results = Vec::new();

    for (position, item) in items.into_iter().enumerate() {
        trace!(position, "each_series: invoking unit");
        let value = f(item).await?;
        results.push(value);
    }

    Ok(results)
}

// ---------------------------------------------------------------------------
// all_catch
// ---------------------------------------------------------------------------

/// Await every future concurrently and only then report.
///
/// Unlike a plain join, a failure does not cut the others short. If all
/// futures succeed the values come back in input order; otherwise the error
/// carries one slot per input, `Some(err)` where that future failed.
pub async fn all_catch<I, Fut, T, E>(futures: I) -> Result<Vec<T>, AllCatchError<E>>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
{
    let settled = join_all(futures).await;

    if settled.iter().all(Result::is_ok) {
        return Ok(settled.into_iter().filter_map(Result::ok).collect());
    }

    let errors = settled.into_iter().map(Result::err).collect();
    Err(AllCatchError { errors })
}
