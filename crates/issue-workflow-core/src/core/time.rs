// crates/issue-workflow-core/src/core/time.rs
// ============================================================================
// Module: Issue Workflow Time Model
// Description: Canonical timestamp representation for issue rows and changes.
// Purpose: Keep store timestamps explicit and comparable.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Issue rows carry `created_at`/`updated_at` stamped by the Issue Store. The
//! service never reads wall-clock time directly; stores obtain it through the
//! [`crate::interfaces::Clock`] seam so tests can pin time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds.
///
/// # Invariants
/// - Ordering follows the numeric millisecond value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the later of `now` and one millisecond past `self`.
    ///
    /// Used by stores so that `updated_at` strictly increases on every write.
    #[must_use]
    pub const fn next_after(self, now: Self) -> Self {
        if now.0 > self.0 { now } else { Self(self.0.saturating_add(1)) }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
