//! First-come-first-served exclusive access with bounded waiting.
//!
//! `std::sync::Mutex` makes no fairness promise, so callers queue on tickets
//! instead: each caller draws the next ticket and proceeds once the counter
//! being served reaches it. A caller that gives up marks its ticket abandoned
//! so the queue skips it rather than stalling.

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
    abandoned: BTreeSet<u64>,
}

impl Tickets {
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

/// A FIFO-ordered mutex around `T`.
#[derive(Debug)]
pub(crate) struct CallGate<T> {
    tickets: Mutex<Tickets>,
    turn: Condvar,
    inner: Mutex<T>,
}

impl<T> CallGate<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            tickets: Mutex::new(Tickets::default()),
            turn: Condvar::new(),
            inner: Mutex::new(value),
        }
    }

    /// Waits for this caller's turn until `deadline`.
    ///
    /// Returns `None` if the deadline passes first.
    pub(crate) fn enter_until(&self, deadline: Instant) -> Option<GateGuard<'_, T>> {
        let mut tickets = self.lock_tickets();
        let ticket = tickets.next;
        tickets.next += 1;

        while tickets.serving != ticket {
            let now = Instant::now();
            if now >= deadline {
                tickets.abandoned.insert(ticket);
                return None;
            }
            tickets = self
                .turn
                .wait_timeout(tickets, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poison| poison.into_inner().0);
        }
        drop(tickets);

        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        Some(GateGuard { gate: self, inner })
    }

    fn lock_tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn release(&self) {
        self.lock_tickets().advance();
        self.turn.notify_all();
    }
}

/// Exclusive access to the gated value; the next ticket is served on drop.
pub(crate) struct GateGuard<'a, T> {
    gate: &'a CallGate<T>,
    inner: MutexGuard<'a, T>,
}

impl<T> Deref for GateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for GateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for GateGuard<'_, T> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
