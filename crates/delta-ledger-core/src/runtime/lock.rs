// crates/delta-ledger-core/src/runtime/lock.rs
// ============================================================================
// Module: Delta Ledger Source Locks
// Description: In-process advisory locks keyed by source table.
// Purpose: Serialize pipeline runs per source table within one process.
// Dependencies: thiserror, crate::core
// ============================================================================

//! ## Overview
//! At most one run may process a source table at a time. The registry hands
//! out one [`SourceLockGuard`] per source table; a second acquisition fails
//! fast instead of blocking so schedulers can treat the collision as a
//! retryable condition. The lock is advisory and process-local; cross-process
//! exclusion, when needed, belongs to the deployment layer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::identifiers::SourceTableId;

// ============================================================================
// SECTION: Lock Registry
// ============================================================================

/// Source lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run already holds the source table's lock; retryable.
    #[error("source table {0} is locked by another run")]
    AlreadyHeld(SourceTableId),
    /// The registry mutex was poisoned by a panicking holder.
    #[error("source lock registry poisoned")]
    Poisoned,
}

/// Registry of per-source advisory locks.
#[derive(Debug, Default, Clone)]
pub struct SourceLockRegistry {
    /// Source tables with a live guard.
    held: Arc<Mutex<BTreeSet<String>>>,
}

impl SourceLockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            held: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Acquires the lock for a source table, failing fast when taken.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::AlreadyHeld`] when a guard for the source table
    /// is still alive, and [`LockError::Poisoned`] when the registry mutex
    /// is unusable.
    pub fn acquire(&self, source_table: &SourceTableId) -> Result<SourceLockGuard, LockError> {
        let mut guard = self.held.lock().map_err(|_| LockError::Poisoned)?;
        if !guard.insert(source_table.to_string()) {
            return Err(LockError::AlreadyHeld(source_table.clone()));
        }
        drop(guard);
        Ok(SourceLockGuard {
            source_table: source_table.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    /// Returns true when the source table currently has a live guard.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Poisoned`] when the registry mutex is unusable.
    pub fn is_held(&self, source_table: &SourceTableId) -> Result<bool, LockError> {
        let guard = self.held.lock().map_err(|_| LockError::Poisoned)?;
        Ok(guard.contains(source_table.as_str()))
    }
}

/// Guard releasing its source table lock on drop.
#[derive(Debug)]
pub struct SourceLockGuard {
    /// Locked source table.
    source_table: String,
    /// Registry the guard releases into.
    held: Arc<Mutex<BTreeSet<String>>>,
}

impl Drop for SourceLockGuard {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.held.lock() {
            guard.remove(&self.source_table);
        }
    }
}
