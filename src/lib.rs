//! A single-assignment promise for threaded Rust.
//!
//! A [`Promise`] is settled exactly once, with a value or an error, by a
//! producer running on its own thread. Callers chain on it with
//! [`Promise::then`] and [`Promise::catch`], which block until settlement,
//! or gather many with [`all`]. Async code can await [`Promise::settled`].
//!
//! # Examples
//!
//! ```
//! use promise_then::Promise;
//!
//! let p = Promise::<i32, String>::new(|resolver, _rejector| resolver.resolve(42));
//! let next: Promise<i32, String> = p.then(|x: &i32| Ok::<i32, String>(x + 1));
//! let failed: Promise<i32, String> = next.then(|_: &i32| Err::<i32, String>("boom".into()));
//!
//! let mut seen = None;
//! failed.catch(|err| seen = Some(err.clone()));
//! assert_eq!(next.value(), Some(&43));
//! assert_eq!(seen.as_deref(), Some("boom"));
//! ```
//!
//! # Settling twice
//!
//! A producer must call `resolve` or `reject` once. A second call is a bug in
//! the producer, not a runtime condition, so it panics with an [`Error`] as
//! the panic payload instead of returning it.
use thiserror::Error;

mod cell;
mod combinator;
mod future;
mod promise;
mod state;

pub use combinator::all;
pub use future::Settled;
pub use promise::{Builder, Link, Promise, Rejector, Resolver};
pub use state::{Settlement, State};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("cannot {attempted} a promise that is already {current}")]
    AlreadySettled {
        attempted: Settlement,
        current: State,
    },
}
