use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::models::PortfolioKey;

#[derive(Debug, Default)]
struct GuardState {
    in_flight: HashSet<PortfolioKey>,
    // In-flight keys invalidated mid-pass; their pass must not be memoized.
    stale: HashSet<PortfolioKey>,
    last_synced: Option<PortfolioKey>,
}

/// Keeps reconciliation passes from overlapping and skips keys already in sync.
///
/// The memo is a single slot: only one portfolio is open at a time, so remembering
/// the last synchronized key is enough and never grows.
#[derive(Debug, Default)]
pub struct SyncGuard {
    state: Mutex<GuardState>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the state consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn should_run(&self, key: &PortfolioKey) -> bool {
        let state = self.lock();
        !state.in_flight.contains(key) && state.last_synced.as_ref() != Some(key)
    }

    pub fn mark_started(&self, key: &PortfolioKey) {
        self.lock().in_flight.insert(key.clone());
    }

    pub fn mark_finished(&self, key: &PortfolioKey, succeeded: bool) {
        let mut state = self.lock();
        state.in_flight.remove(key);
        let stale = state.stale.remove(key);
        if succeeded && !stale {
            state.last_synced = Some(key.clone());
        }
    }

    /// Forgets that `key` was synchronized. Call as soon as an external change arrives.
    /// A pass already in flight for `key` read the old state, so it won't be memoized.
    pub fn invalidate(&self, key: &PortfolioKey) {
        let mut state = self.lock();
        if state.last_synced.as_ref() == Some(key) {
            debug!("invalidating sync memo for {}", key);
            state.last_synced = None;
        }
        if state.in_flight.contains(key) {
            state.stale.insert(key.clone());
        }
    }

    /// `should_run` and `mark_started` under one lock.
    pub fn try_begin(&self, key: &PortfolioKey) -> Option<SyncTicket<'_>> {
        let mut state = self.lock();
        if state.in_flight.contains(key) || state.last_synced.as_ref() == Some(key) {
            return None;
        }
        state.in_flight.insert(key.clone());
        Some(SyncTicket {
            guard: self,
            key: key.clone(),
            finished: false,
        })
    }

    pub fn is_in_flight(&self, key: &PortfolioKey) -> bool {
        self.lock().in_flight.contains(key)
    }
}

/// An in-flight pass. Dropped without `finish` it counts as failed, so an aborted
/// task never leaves its key stuck in flight.
pub struct SyncTicket<'a> {
    guard: &'a SyncGuard,
    key: PortfolioKey,
    finished: bool,
}

impl SyncTicket<'_> {
    pub fn finish(mut self, succeeded: bool) {
        self.finished = true;
        self.guard.mark_finished(&self.key, succeeded);
    }
}

impl Drop for SyncTicket<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.guard.mark_finished(&self.key, false);
        }
    }
}
