// crates/issue-workflow-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Issue Store
// Description: Mutex-guarded issue rows and changelog for tests and embedding.
// Purpose: Provide a deterministic Issue Store without external dependencies.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryIssueStore`] keeps rows in a key-ordered map behind a mutex.
//! Clones share the same rows, so tests can keep a handle after moving the
//! store into a service. Durable deployments use the SQLite store instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::FieldDiff;
use crate::core::Issue;
use crate::core::IssueChange;
use crate::core::IssueKey;
use crate::core::Login;
use crate::interfaces::Clock;
use crate::interfaces::IssueStore;
use crate::interfaces::StoreError;
use crate::runtime::clock::SystemClock;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Rows guarded together so issue and changelog writes stay consistent.
#[derive(Debug, Default)]
struct StoreState {
    /// Issue rows by key.
    issues: BTreeMap<IssueKey, Issue>,
    /// Changelog entries by issue key, oldest first.
    changes: BTreeMap<IssueKey, Vec<IssueChange>>,
}

/// In-memory issue store.
#[derive(Clone)]
pub struct InMemoryIssueStore {
    /// Shared rows.
    state: Arc<Mutex<StoreState>>,
    /// Time source for row stamps.
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryIssueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIssueStore {
    /// Creates an empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            clock,
        }
    }

    /// Number of stored issues.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.issues.len())
    }

    /// Returns true when no issue is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.issues.is_empty())
    }

    /// Acquires the row lock.
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Store("issue store mutex poisoned".to_string()))
    }

    /// Overwrites an existing row, keeping `created_at` and advancing `updated_at`.
    fn replace_row(&self, state: &mut StoreState, issue: &Issue) -> Result<Issue, StoreError> {
        let previous = state
            .issues
            .get(&issue.key)
            .ok_or_else(|| StoreError::NotFound(issue.key.to_string()))?;
        let mut row = issue.clone();
        row.created_at = previous.created_at;
        row.updated_at = previous.updated_at.next_after(self.clock.now());
        state.issues.insert(row.key.clone(), row.clone());
        Ok(row)
    }
}

impl std::fmt::Debug for InMemoryIssueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIssueStore").finish_non_exhaustive()
    }
}

impl IssueStore for InMemoryIssueStore {
    fn insert(&self, issues: &[Issue]) -> Result<Vec<Issue>, StoreError> {
        let mut guard = self.lock()?;
        let mut seen = std::collections::BTreeSet::new();
        for issue in issues {
            if guard.issues.contains_key(&issue.key) || !seen.insert(&issue.key) {
                return Err(StoreError::Conflict(format!("issue already exists: {}", issue.key)));
            }
        }
        let now = self.clock.now();
        let mut stored = Vec::with_capacity(issues.len());
        for issue in issues {
            let mut row = issue.clone();
            row.created_at = now;
            row.updated_at = now;
            guard.issues.insert(row.key.clone(), row.clone());
            stored.push(row);
        }
        Ok(stored)
    }

    fn select_by_key(&self, key: &IssueKey) -> Result<Option<Issue>, StoreError> {
        Ok(self.lock()?.issues.get(key).cloned())
    }

    fn select_all(&self) -> Result<Vec<Issue>, StoreError> {
        Ok(self.lock()?.issues.values().cloned().collect())
    }

    fn update(&self, issue: &Issue) -> Result<Issue, StoreError> {
        let mut guard = self.lock()?;
        self.replace_row(&mut guard, issue)
    }

    fn update_with_change(
        &self,
        issue: &Issue,
        user: &Login,
        diffs: Vec<FieldDiff>,
    ) -> Result<Issue, StoreError> {
        let mut guard = self.lock()?;
        let row = self.replace_row(&mut guard, issue)?;
        if !diffs.is_empty() {
            guard.changes.entry(row.key.clone()).or_default().push(IssueChange {
                issue_key: row.key.clone(),
                user: user.clone(),
                created_at: row.updated_at,
                diffs,
            });
        }
        Ok(row)
    }

    fn insert_change(&self, change: &IssueChange) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if !guard.issues.contains_key(&change.issue_key) {
            return Err(StoreError::NotFound(change.issue_key.to_string()));
        }
        guard.changes.entry(change.issue_key.clone()).or_default().push(change.clone());
        Ok(())
    }

    fn select_changes(&self, key: &IssueKey) -> Result<Vec<IssueChange>, StoreError> {
        Ok(self.lock()?.changes.get(key).cloned().unwrap_or_default())
    }
}
