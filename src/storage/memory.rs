//! In-memory store with transactional, all-or-nothing semantics.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::errors::{BillingError, Result};

use super::{BillingStore, Tables, TxLock};

/// in-memory store backing the engine
///
/// Writes run against a working copy of the dataset while the data mutex is
/// held; the copy replaces the dataset only when the closure succeeds, so a
/// mid-transaction failure leaves nothing behind. The lock registry gives
/// row-lock semantics: a second transaction on the same key fails fast with
/// [`BillingError::TransactionConflict`] instead of silently interleaving.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    locks: Mutex<HashSet<TxLock>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// seed a store with an existing dataset
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            tables: Mutex::new(tables),
            locks: Mutex::new(HashSet::new()),
        }
    }

    /// claim a lock key, failing on conflict; released when the guard drops
    pub fn acquire(&self, key: TxLock) -> Result<LockGuard<'_>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if !locks.insert(key) {
            return Err(BillingError::TransactionConflict {
                message: format!("{key:?} is locked by another settlement in flight"),
            });
        }
        debug!(?key, "acquired settlement lock");
        Ok(LockGuard { store: self, key })
    }

    fn release(&self, key: TxLock) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(&key);
        debug!(?key, "released settlement lock");
    }
}

impl BillingStore for MemoryStore {
    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        f(&tables)
    }

    fn in_transaction<R>(&self, lock: TxLock, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R> {
        let _guard = self.acquire(lock)?;
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = tables.clone();
        match f(&mut working) {
            Ok(value) => {
                *tables = working;
                Ok(value)
            }
            Err(err) => {
                debug!(?lock, error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }
}

/// RAII guard for a claimed lock key
pub struct LockGuard<'a> {
    store: &'a MemoryStore,
    key: TxLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.store.release(self.key);
    }
}
