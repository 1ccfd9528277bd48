use std::fmt;
use std::sync::Arc;

/// Observable settlement state of a [`Promise`](crate::Promise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Resolved,
    Rejected,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Pending => "pending",
            State::Resolved => "resolved",
            State::Rejected => "rejected",
        })
    }
}

/// Which settlement a handle tried to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Settlement {
    Resolve,
    Reject,
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Settlement::Resolve => "resolve",
            Settlement::Reject => "reject",
        })
    }
}

/// The payload written once at settlement.
///
/// The error is kept behind an `Arc` so a rejection can travel down a
/// `then` chain into promises of a different value type without cloning it.
#[derive(Debug)]
pub(crate) enum Outcome<T, E> {
    Resolved(T),
    Rejected(Arc<E>),
}

impl<T, E> Outcome<T, E> {
    pub(crate) fn state(&self) -> State {
        match self {
            Outcome::Resolved(_) => State::Resolved,
            Outcome::Rejected(_) => State::Rejected,
        }
    }

    pub(crate) fn settlement(&self) -> Settlement {
        match self {
            Outcome::Resolved(_) => Settlement::Resolve,
            Outcome::Rejected(_) => Settlement::Reject,
        }
    }

    pub(crate) fn as_result(&self) -> Result<&T, &E> {
        match self {
            Outcome::Resolved(value) => Ok(value),
            Outcome::Rejected(err) => Err(err.as_ref()),
        }
    }
}
