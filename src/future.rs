//! Awaiting a promise from async code.
//!
use crate::Promise;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Completes with the promise itself once it has settled.
///
/// Any number of `Settled` futures may wait on one promise; settlement wakes
/// all of them.
///
/// # Examples
///
/// ```
/// use promise_then::Promise;
/// use futures::executor::block_on;
///
/// let p = Promise::<&str, ()>::new(|resolver, _| resolver.resolve("🍓"));
/// let settled = block_on(p.settled());
/// assert_eq!(settled.value(), Some(&"🍓"));
/// ```
#[must_use = "futures do nothing unless polled"]
pub struct Settled<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Settled<T, E> {
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self { promise }
    }
}

impl<T, E> Future for Settled<T, E> {
    type Output = Promise<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.promise.cell.register(cx.waker()) {
            Poll::Ready(self.promise.clone())
        } else {
            Poll::Pending
        }
    }
}

impl<T, E> fmt::Debug for Settled<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("state", &self.promise.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::Promise;
    use futures::executor::block_on;
    use futures::future::join;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn settled_wakes_every_waiter() {
        let p = Promise::<String, String>::new(|resolver, _| {
            thread::sleep(Duration::from_millis(30));
            resolver.resolve("🍓".into());
        });
        let (a, b) = block_on(join(p.settled(), p.settled()));
        assert!(a.ptr_eq(&p));
        assert!(b.ptr_eq(&p));
        assert_eq!(a.value().map(String::as_str), Some("🍓"));
    }

    #[test]
    fn settled_on_other_threads() {
        let p = Promise::<u32, String>::new(|_, rejector| {
            thread::sleep(Duration::from_millis(10));
            rejector.reject("💥".into());
        });
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let settled = p.settled();
                thread::spawn(move || block_on(settled).error().cloned())
            })
            .collect();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap().as_deref(), Some("💥"));
        }
    }

    #[test]
    fn already_settled_is_ready_immediately() {
        let p = Promise::<i32, ()>::resolved(1);
        assert_eq!(block_on(p.settled()).value(), Some(&1));
    }
}
