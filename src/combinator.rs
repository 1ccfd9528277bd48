use crate::Promise;
use std::thread;

/// Waits for every promise to settle and collects the outcomes in input order.
///
/// One waiter thread is spawned per promise; the call returns once all of
/// them have seen settlement, whatever order that happened in. Element `i`
/// is `Ok` with the value of `promises[i]` if it resolved, `Err` with its
/// error if it rejected.
///
/// Like every other wait in this crate, a promise that is never settled
/// makes this block forever.
///
/// # Examples
///
/// ```
/// use promise_then::{all, Promise};
///
/// let promises = [
///     Promise::<i32, &str>::new(|resolver, _| resolver.resolve(1)),
///     Promise::<i32, &str>::new(|_, rejector| rejector.reject("err")),
/// ];
/// assert_eq!(all(&promises), vec![Ok(1), Err("err")]);
/// ```
pub fn all<T, E>(promises: &[Promise<T, E>]) -> Vec<Result<T, E>>
where
    T: Clone + Send + Sync,
    E: Clone + Send + Sync,
{
    tracing::trace!(count = promises.len(), "waiting on all promises");
    thread::scope(|scope| {
        for promise in promises {
            scope.spawn(move || {
                let _ = promise.wait();
            });
        }
    });
    promises
        .iter()
        .map(|promise| promise.wait().map(T::clone).map_err(E::clone))
        .collect()
}
