//! Single-flight refresh gate
//!
//! Explicit state machine for the "refresh in flight" flag and the queue of
//! requests waiting on it:
//!
//! - `Idle` → `Refreshing` when the first 401 enters (that caller leads)
//! - `Refreshing` + 401 → caller queued (FIFO), no second refresh
//! - `Refreshing` → `Idle` when the leader settles; every queued caller gets
//!   the same outcome, in the order it was queued
//!
//! The leader holds a `RefreshLease`. Dropping the lease without settling
//! (e.g. the leading future was cancelled) rejects the queue so no caller
//! waits forever.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use common::Secret;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};

/// Result of one refresh: the new access token or the failure.
pub type Outcome = Result<Secret<String>>;

enum GateState {
    Idle,
    Refreshing {
        waiters: VecDeque<oneshot::Sender<Outcome>>,
    },
}

/// Coordinates concurrent 401s so that exactly one refresh runs at a time.
pub struct RefreshGate {
    state: Mutex<GateState>,
    generations: AtomicU64,
}

/// What a caller must do after entering the gate.
pub enum Ticket<'a> {
    /// No refresh was running: this caller performs it and must settle the lease.
    Leader(RefreshLease<'a>),
    /// A refresh is running: await its outcome.
    Follower(oneshot::Receiver<Outcome>),
}

/// Obligation to settle the refresh the holder is leading.
pub struct RefreshLease<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Publish the outcome to every queued caller and reopen the gate.
    ///
    /// Returns how many queued callers were released.
    pub fn settle(mut self, outcome: &Outcome) -> usize {
        self.settled = true;
        self.gate.release(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let released = self
                .gate
                .release(&Err(Error::RefreshInvalid("refresh abandoned".into())));
            debug!(released, "refresh lease dropped unsettled, queue rejected");
        }
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
            generations: AtomicU64::new(0),
        }
    }

    /// Enter the gate after a 401.
    pub fn enter(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if let GateState::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push_back(tx);
            return Ticket::Follower(rx);
        }

        *state = GateState::Refreshing {
            waiters: VecDeque::new(),
        };
        self.generations.fetch_add(1, Ordering::Relaxed);
        Ticket::Leader(RefreshLease {
            gate: self,
            settled: false,
        })
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), GateState::Refreshing { .. })
    }

    /// Number of callers queued behind the running refresh.
    pub fn pending(&self) -> usize {
        match &*self.lock() {
            GateState::Idle => 0,
            GateState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// How many refreshes have been led since creation.
    pub fn generations(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }

    fn release(&self, outcome: &Outcome) -> usize {
        let waiters = match std::mem::replace(&mut *self.lock(), GateState::Idle) {
            GateState::Idle => VecDeque::new(),
            GateState::Refreshing { waiters } => waiters,
        };
        let released = waiters.len();
        for waiter in waiters {
            // Receiver gone means that caller was cancelled; nothing to deliver
            let _ = waiter.send(outcome.clone());
        }
        released
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
