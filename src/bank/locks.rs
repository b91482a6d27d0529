use crate::bank::account::AccountId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Registry of per-account mutexes.
///
/// Holding the guard for an account serializes every read-modify-write on it.
/// Different accounts get different mutexes and never wait on each other; the
/// registry lock itself is only held long enough to look up or insert an entry.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

/// Mutex handle for one account; call [`AccountLock::lock`] to enter
#[derive(Debug, Clone)]
pub struct AccountLock(Arc<Mutex<()>>);

impl AccountLock {
    /// Block until no other mutation holds this account.
    ///
    /// The mutex guards no data of its own, so a poisoned lock (a panic while
    /// it was held) is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, id: AccountId) -> AccountLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        AccountLock(locks.entry(id).or_default().clone())
    }

    /// Number of accounts that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
