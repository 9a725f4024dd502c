// crates/issue-workflow-core/src/runtime/locks.rs
// ============================================================================
// Module: Per-Key Locks
// Description: Lazily created mutexes keyed by issue key.
// Purpose: Serialize mutations of one issue while leaving others independent.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! [`KeyLocks`] hands out one mutex per issue key. The table lock is held
//! only while looking up or dropping an entry, never while a mutation runs,
//! so operations on different keys proceed concurrently. Entries are
//! removed once no caller holds them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::IssueKey;

// ============================================================================
// SECTION: Lock Table
// ============================================================================

/// Lock poisoned while a mutation was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLockPoisoned;

/// Table of per-key mutexes.
#[derive(Debug, Default)]
pub struct KeyLocks {
    /// Live key mutexes.
    table: Mutex<HashMap<IssueKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the mutex for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLockPoisoned`] when the table or key mutex is poisoned.
    pub fn with_key<T>(&self, key: &IssueKey, f: impl FnOnce() -> T) -> Result<T, KeyLockPoisoned> {
        let entry = {
            let mut table = self.table.lock().map_err(|_| KeyLockPoisoned)?;
            Arc::clone(table.entry(key.clone()).or_default())
        };
        let outcome = {
            let _guard = entry.lock().map_err(|_| KeyLockPoisoned)?;
            f()
        };
        let mut table = self.table.lock().map_err(|_| KeyLockPoisoned)?;
        drop(entry);
        if table.get(key).is_some_and(|live| Arc::strong_count(live) == 1) {
            table.remove(key);
        }
        Ok(outcome)
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.table.lock().map_or(0, |table| table.len())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
