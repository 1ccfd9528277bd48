use crate::cell::Cell;
use crate::future::Settled;
use crate::state::{Outcome, State};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;

/// A single-assignment future settled by a producer thread.
///
/// Cloning a `Promise` clones the handle, not the value: every clone observes
/// the same settlement. Use [`Promise::ptr_eq`] to tell whether two handles
/// are the same instance.
///
/// # Examples
///
/// ```
/// use promise_then::Promise;
/// use std::{thread, time::Duration};
///
/// let p = Promise::<i32, String>::new(|resolver, _rejector| {
///     thread::sleep(Duration::from_millis(10));
///     resolver.resolve(42);
/// });
/// assert_eq!(p.wait(), Ok(&42));
/// ```
pub struct Promise<T, E> {
    pub(crate) cell: Arc<Cell<T, E>>,
}

/// What a [`Promise::then`] resolver hands back to the chain.
///
/// `Result<U, E>` converts into `Value`/`Error` and a `Promise<U, E>`
/// converts into `Promise`, so resolvers rarely name this type.
#[derive(Debug)]
pub enum Link<U, E> {
    Value(U),
    Error(E),
    /// Returned as-is by `then`, without waiting on it.
    Promise(Promise<U, E>),
}

impl<U, E> From<Result<U, E>> for Link<U, E> {
    fn from(result: Result<U, E>) -> Self {
        match result {
            Ok(value) => Link::Value(value),
            Err(err) => Link::Error(err),
        }
    }
}

impl<U, E> From<Promise<U, E>> for Link<U, E> {
    fn from(promise: Promise<U, E>) -> Self {
        Link::Promise(promise)
    }
}

/// Shared by every [`Resolver`] and [`Rejector`] clone of one promise.
struct Settler<T, E> {
    cell: Arc<Cell<T, E>>,
}

impl<T, E> Settler<T, E> {
    fn settle(&self, outcome: Outcome<T, E>) {
        if let Err(err) = self.cell.settle(outcome) {
            tracing::error!(%err, "promise settled more than once");
            std::panic::panic_any(err);
        }
        tracing::debug!(state = %self.cell.state(), "promise settled");
    }
}

impl<T, E> Drop for Settler<T, E> {
    /// Waiters on a promise nobody can settle any more will block forever.
    fn drop(&mut self) {
        if self.cell.state() == State::Pending {
            tracing::warn!("last settlement handle dropped while the promise is pending");
        }
    }
}

/// Settles its promise with a value.
///
/// Resolving a promise that is already settled, through this handle, a clone
/// of it, or its [`Rejector`], panics with [`Error::AlreadySettled`](crate::Error)
/// as the payload.
pub struct Resolver<T, E> {
    settler: Arc<Settler<T, E>>,
}

impl<T, E> Resolver<T, E> {
    pub fn resolve(&self, value: T) {
        self.settler.settle(Outcome::Resolved(value))
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            settler: self.settler.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("state", &self.settler.cell.state())
            .finish()
    }
}

/// Settles its promise with an error. Same single-use contract as [`Resolver`].
pub struct Rejector<T, E> {
    settler: Arc<Settler<T, E>>,
}

impl<T, E> Rejector<T, E> {
    pub fn reject(&self, err: E) {
        self.settler.settle(Outcome::Rejected(Arc::new(err)))
    }
}

impl<T, E> Clone for Rejector<T, E> {
    fn clone(&self) -> Self {
        Self {
            settler: self.settler.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Rejector<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejector")
            .field("state", &self.settler.cell.state())
            .finish()
    }
}

/// Configures the thread a producer runs on.
///
/// # Examples
///
/// ```
/// use promise_then::{Builder, Promise};
///
/// let p: Promise<Option<String>, ()> = Builder::new()
///     .name("answer")
///     .spawn(|resolver, _rejector| {
///         resolver.resolve(std::thread::current().name().map(str::to_owned))
///     })
///     .unwrap();
/// assert_eq!(p.wait(), Ok(&Some("answer".to_string())));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the producer thread.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the producer thread's stack size in bytes.
    pub fn stack_size(self, size: usize) -> Self {
        Self {
            stack_size: Some(size),
            ..self
        }
    }

    /// Creates a pending promise and runs `producer` on a new thread.
    ///
    /// Returns immediately. Fails only if the OS refuses to spawn the thread.
    pub fn spawn<T, E, F>(self, producer: F) -> io::Result<Promise<T, E>>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: FnOnce(Resolver<T, E>, Rejector<T, E>) + Send + 'static,
    {
        let (promise, resolver, rejector) = Promise::pending();
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(move || {
            tracing::trace!("producer started");
            producer(resolver, rejector)
        })?;
        Ok(promise)
    }
}

impl<T, E> Promise<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a pending promise and runs `producer` on a new thread.
    ///
    /// `producer` must call exactly one of `resolve`/`reject`, once. If it
    /// never does, the promise stays pending and every waiter blocks forever.
    ///
    /// # Panics
    ///
    /// Panics if the producer thread cannot be spawned; see [`Builder::spawn`]
    /// for the fallible form.
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejector<T, E>) + Send + 'static,
    {
        Builder::new()
            .spawn(producer)
            .expect("failed to spawn promise producer thread")
    }
}

impl<T, E> Promise<T, E> {
    /// A promise that is already resolved. No thread is spawned.
    pub fn resolved(value: T) -> Self {
        Self::from_outcome(Outcome::Resolved(value))
    }

    /// A promise that is already rejected. No thread is spawned.
    pub fn rejected(err: E) -> Self {
        Self::from_outcome(Outcome::Rejected(Arc::new(err)))
    }

    fn from_outcome(outcome: Outcome<T, E>) -> Self {
        Self {
            cell: Arc::new(Cell::settled(outcome)),
        }
    }

    pub(crate) fn pending() -> (Self, Resolver<T, E>, Rejector<T, E>) {
        let cell = Arc::new(Cell::pending());
        let settler = Arc::new(Settler { cell: cell.clone() });
        (
            Self { cell },
            Resolver {
                settler: settler.clone(),
            },
            Rejector { settler },
        )
    }

    pub fn state(&self) -> State {
        self.cell.state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == State::Resolved
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == State::Rejected
    }

    /// The resolved value, or `None` if the promise is pending or rejected.
    /// Never blocks.
    pub fn value(&self) -> Option<&T> {
        match self.cell.outcome()? {
            Outcome::Resolved(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    /// The rejection error, or `None` if the promise is pending or resolved.
    /// Never blocks.
    pub fn error(&self) -> Option<&E> {
        match self.cell.outcome()? {
            Outcome::Rejected(err) => Some(err.as_ref()),
            Outcome::Resolved(_) => None,
        }
    }

    /// Blocks until settled, then borrows the outcome.
    pub fn wait(&self) -> Result<&T, &E> {
        self.cell.wait().as_result()
    }

    /// A future that completes once this promise is settled.
    pub fn settled(&self) -> Settled<T, E> {
        Settled::new(self.clone())
    }

    /// Whether both handles refer to the same promise instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Blocks until settled, then continues the chain.
    ///
    /// A rejection passes through untouched and `resolver` is not called.
    /// Otherwise `resolver` runs on the calling thread and its [`Link`]
    /// decides the next promise:
    ///
    /// * a value or an error becomes a new, already settled promise;
    /// * a promise is returned as-is and is *not* waited on here. Calling
    ///   `then`/`catch` on it is what waits for it.
    ///
    /// `then` never spawns a thread.
    pub fn then<U, R, F>(&self, resolver: F) -> Promise<U, E>
    where
        F: FnOnce(&T) -> R,
        R: Into<Link<U, E>>,
    {
        match self.cell.wait() {
            Outcome::Rejected(err) => Promise::from_outcome(Outcome::Rejected(err.clone())),
            Outcome::Resolved(value) => {
                let link: Link<U, E> = resolver(value).into();
                match link {
                    Link::Value(value) => Promise::resolved(value),
                    Link::Error(err) => Promise::rejected(err),
                    Link::Promise(next) => next,
                }
            }
        }
    }

    /// Blocks until settled and calls `rejector` if the promise was rejected.
    ///
    /// Whatever `rejector` returns is dropped. The receiver itself is returned,
    /// so a resolved promise keeps flowing and a rejected one stays rejected
    /// for the next `catch`.
    pub fn catch<R, F>(&self, rejector: F) -> Self
    where
        F: FnOnce(&E) -> R,
    {
        if let Outcome::Rejected(err) = self.cell.wait() {
            let _ = rejector(err.as_ref());
        }
        self.clone()
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Promise");
        s.field("state", &self.state());
        if let Some(value) = self.value() {
            s.field("value", value);
        }
        if let Some(err) = self.error() {
            s.field("error", err);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Settlement;
    use crate::Error;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn violation(settle: impl FnOnce()) -> Error {
        let payload = panic::catch_unwind(AssertUnwindSafe(settle))
            .expect_err("second settlement should panic");
        *payload
            .downcast::<Error>()
            .expect("panic payload should be an Error")
    }

    #[test]
    fn resolved_promise_reports_its_value() {
        let (p, resolver, _rejector) = Promise::<String, String>::pending();
        assert!(p.is_pending());
        assert_eq!(p.value(), None);

        resolver.resolve("v".into());
        assert!(p.is_resolved());
        assert!(!p.is_pending());
        assert!(!p.is_rejected());
        assert_eq!(p.value(), Some(&"v".to_string()));
        assert_eq!(p.error(), None);
    }

    #[test]
    fn rejected_promise_reports_its_error() {
        let (p, _resolver, rejector) = Promise::<String, String>::pending();
        rejector.reject("e".into());
        assert!(p.is_rejected());
        assert_eq!(p.state(), State::Rejected);
        assert_eq!(p.error(), Some(&"e".to_string()));
        assert_eq!(p.value(), None);
    }

    #[test]
    fn every_double_settlement_panics() {
        let (p, resolver, rejector) = Promise::<i32, &str>::pending();
        resolver.resolve(1);

        let resolve_again = violation(|| resolver.resolve(2));
        assert_eq!(
            resolve_again,
            Error::AlreadySettled {
                attempted: Settlement::Resolve,
                current: State::Resolved,
            }
        );
        let reject_after = violation(|| rejector.reject("late"));
        assert_eq!(
            reject_after,
            Error::AlreadySettled {
                attempted: Settlement::Reject,
                current: State::Resolved,
            }
        );
        assert_eq!(p.value(), Some(&1));

        let (p, resolver, rejector) = Promise::<i32, &str>::pending();
        rejector.reject("first");
        let reject_again = violation(|| rejector.clone().reject("second"));
        assert_eq!(
            reject_again,
            Error::AlreadySettled {
                attempted: Settlement::Reject,
                current: State::Rejected,
            }
        );
        let resolve_after = violation(|| resolver.resolve(3));
        assert_eq!(
            resolve_after,
            Error::AlreadySettled {
                attempted: Settlement::Resolve,
                current: State::Rejected,
            }
        );
        assert_eq!(p.error(), Some(&"first"));
    }

    #[test]
    fn then_skips_resolver_on_rejection() {
        let p = Promise::<i32, String>::rejected("no".into());
        let called = AtomicBool::new(false);
        let next: Promise<i32, String> = p.then(|x: &i32| {
            called.store(true, Ordering::SeqCst);
            Ok::<i32, String>(*x)
        });
        assert!(!called.load(Ordering::SeqCst));
        assert!(next.is_rejected());
        // the error itself is shared, not copied
        assert!(std::ptr::eq(next.error().unwrap(), p.error().unwrap()));
    }

    #[test]
    fn then_classifies_resolver_output() {
        let p = Promise::<i32, String>::resolved(2);

        let value: Promise<i32, String> = p.then(|x: &i32| Ok::<i32, String>(x * 10));
        assert_eq!(value.value(), Some(&20));

        let err: Promise<i32, String> = p.then(|_: &i32| Err::<i32, String>("bad".into()));
        assert_eq!(err.error(), Some(&"bad".to_string()));

        let inner = Promise::<&str, String>::resolved("inner");
        let passed: Promise<&str, String> = p.then(|_: &i32| inner.clone());
        assert!(passed.ptr_eq(&inner));

        let explicit: Promise<i32, String> = p.then(|x: &i32| Link::Value(x + 1));
        assert_eq!(explicit.value(), Some(&3));
    }

    #[test]
    fn then_returns_inner_promise_without_waiting() {
        let p = Promise::<i32, ()>::resolved(1);
        let (inner, resolver, _rejector) = Promise::<i32, ()>::pending();
        let next: Promise<i32, ()> = p.then(|_: &i32| inner.clone());
        assert!(next.is_pending());

        resolver.resolve(5);
        let after: Promise<i32, ()> = next.then(|x: &i32| Ok::<i32, ()>(x + 1));
        assert_eq!(after.value(), Some(&6));
    }

    #[test]
    fn catch_returns_receiver() {
        let ok = Promise::<i32, String>::resolved(1);
        let called = AtomicBool::new(false);
        let same = ok.catch(|_| called.store(true, Ordering::SeqCst));
        assert!(same.ptr_eq(&ok));
        assert!(!called.load(Ordering::SeqCst));

        let failed = Promise::<i32, String>::rejected("x".into());
        let mut seen = None;
        let same = failed.catch(|err| {
            seen = Some(err.clone());
            "ignored"
        });
        assert!(same.ptr_eq(&failed));
        assert!(same.is_rejected());
        assert_eq!(seen.as_deref(), Some("x"));
    }

    #[test]
    fn builder_names_producer_thread() {
        let p = Builder::new()
            .name("producer-under-test")
            .stack_size(256 * 1024)
            .spawn(|resolver: Resolver<String, ()>, _| {
                resolver.resolve(thread::current().name().unwrap_or_default().to_owned())
            })
            .unwrap();
        assert_eq!(p.wait(), Ok(&"producer-under-test".to_string()));
    }

    #[test]
    fn dropping_handles_leaves_promise_pending() {
        let (p, resolver, rejector) = Promise::<i32, ()>::pending();
        drop(resolver);
        drop(rejector);
        assert!(p.is_pending());
    }

    #[test]
    fn debug_shows_outcome() {
        let p = Promise::<i32, ()>::resolved(4);
        assert_eq!(format!("{p:?}"), "Promise { state: Resolved, value: 4 }");
    }
}
