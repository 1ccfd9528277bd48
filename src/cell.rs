//! The write-once settlement cell behind every promise.
//!
//! Settlement happens in four steps: CAS the tag from `PENDING` to
//! `SETTLING`, store the outcome, publish the final tag with `Release`, then
//! broadcast to blocked threads and registered wakers. Readers load the tag
//! with `Acquire` and only touch the outcome once a final tag is visible, so
//! no reader can see `Resolved` without its value.
use crate::state::{Outcome, State};
use crate::Error;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::task::Waker;

const PENDING: u8 = 0;
const SETTLING: u8 = 1;
const RESOLVED: u8 = 2;
const REJECTED: u8 = 3;

pub(crate) struct Cell<T, E> {
    tag: AtomicU8,
    outcome: OnceLock<Outcome<T, E>>,
    wakers: Mutex<Vec<Waker>>,
    settled: Condvar,
}

impl<T, E> Cell<T, E> {
    pub(crate) fn pending() -> Self {
        Self {
            tag: AtomicU8::new(PENDING),
            outcome: OnceLock::new(),
            wakers: Mutex::new(Vec::new()),
            settled: Condvar::new(),
        }
    }

    /// A cell that starts out settled; nobody can be waiting on it yet.
    pub(crate) fn settled(outcome: Outcome<T, E>) -> Self {
        let tag = final_tag(&outcome);
        Self {
            tag: AtomicU8::new(tag),
            outcome: OnceLock::from(outcome),
            wakers: Mutex::new(Vec::new()),
            settled: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> State {
        tag_state(self.tag.load(Ordering::Acquire))
    }

    /// The outcome, if a final tag has been published.
    pub(crate) fn outcome(&self) -> Option<&Outcome<T, E>> {
        match self.tag.load(Ordering::Acquire) {
            RESOLVED | REJECTED => self.outcome.get(),
            _ => None,
        }
    }

    /// Applies `outcome` if and only if the cell is still pending.
    pub(crate) fn settle(&self, outcome: Outcome<T, E>) -> Result<(), Error> {
        let attempted = outcome.settlement();
        if let Err(mut current) =
            self.tag
                .compare_exchange(PENDING, SETTLING, Ordering::AcqRel, Ordering::Acquire)
        {
            // The winner is between its CAS and its publish; report what it lands on.
            while current == SETTLING {
                std::hint::spin_loop();
                current = self.tag.load(Ordering::Acquire);
            }
            return Err(Error::AlreadySettled {
                attempted,
                current: tag_state(current),
            });
        }

        let tag = final_tag(&outcome);
        let stored = self.outcome.set(outcome).is_ok();
        debug_assert!(stored, "outcome written before the state tag was claimed");
        self.tag.store(tag, Ordering::Release);

        let wakers = {
            let mut wakers = self.lock();
            self.settled.notify_all();
            std::mem::take(&mut *wakers)
        };
        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    /// Blocks the calling thread until the cell is settled.
    pub(crate) fn wait(&self) -> &Outcome<T, E> {
        if let Some(outcome) = self.outcome() {
            return outcome;
        }
        let mut wakers = self.lock();
        loop {
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            wakers = self
                .settled
                .wait(wakers)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Registers `waker` to be woken at settlement.
    ///
    /// Returns `true` instead of registering if the cell already settled.
    pub(crate) fn register(&self, waker: &Waker) -> bool {
        let mut wakers = self.lock();
        if self.outcome().is_some() {
            return true;
        }
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
        false
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Waker>> {
        self.wakers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn final_tag<T, E>(outcome: &Outcome<T, E>) -> u8 {
    match outcome.state() {
        State::Resolved => RESOLVED,
        State::Rejected => REJECTED,
        State::Pending => PENDING,
    }
}

fn tag_state(tag: u8) -> State {
    match tag {
        RESOLVED => State::Resolved,
        REJECTED => State::Rejected,
        _ => State::Pending,
    }
}
