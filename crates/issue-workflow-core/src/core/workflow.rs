// crates/issue-workflow-core/src/core/workflow.rs
// ============================================================================
// Module: Issue Workflow State Machine
// Description: Legal status/resolution transitions and their guards.
// Purpose: Evaluate transitions by pure table lookup over (status, resolution).
// Dependencies: crate::core::issue, serde, thiserror
// ============================================================================

//! ## Overview
//! The workflow is a finite table: each [`Transition`] names the statuses it
//! may leave from, the status it lands in, and what happens to the
//! resolution. Available transitions are always re-derived from the two
//! workflow fields and never cached on the issue.
//!
//! | transition      | from                         | to        | resolution     |
//! |-----------------|------------------------------|-----------|----------------|
//! | `confirm`       | OPEN, REOPENED               | CONFIRMED | cleared        |
//! | `unconfirm`     | CONFIRMED                    | REOPENED  | cleared        |
//! | `resolve`       | OPEN, REOPENED, CONFIRMED    | RESOLVED  | FIXED          |
//! | `reopen`        | RESOLVED, CLOSED             | REOPENED  | cleared        |
//! | `falsepositive` | OPEN, REOPENED, CONFIRMED    | RESOLVED  | FALSE-POSITIVE |
//! | `wontfix`       | OPEN, REOPENED, CONFIRMED    | RESOLVED  | WONTFIX        |
//! | `close`         | RESOLVED                     | CLOSED    | kept           |

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::issue::IssueStatus;
use crate::core::issue::ParseValueError;
use crate::core::issue::Resolution;

// ============================================================================
// SECTION: Transitions
// ============================================================================

/// Named workflow transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Acknowledge an open or reopened issue.
    Confirm,
    /// Withdraw a confirmation.
    Unconfirm,
    /// Mark the issue fixed.
    Resolve,
    /// Reopen a resolved or closed issue.
    Reopen,
    /// Mark the issue a false positive.
    FalsePositive,
    /// Accept the issue as won't fix.
    WontFix,
    /// Close a resolved issue.
    Close,
}

impl Transition {
    /// All transitions in table order.
    pub const ALL: [Self; 7] = [
        Self::Confirm,
        Self::Unconfirm,
        Self::Resolve,
        Self::Reopen,
        Self::FalsePositive,
        Self::WontFix,
        Self::Close,
    ];

    /// Returns the stable transition key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Unconfirm => "unconfirm",
            Self::Resolve => "resolve",
            Self::Reopen => "reopen",
            Self::FalsePositive => "falsepositive",
            Self::WontFix => "wontfix",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Transition {
    type Err = ParseValueError;

    /// Parses a transition key case-insensitively (`falsePositive` is accepted).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|transition| transition.key().eq_ignore_ascii_case(value))
            .ok_or_else(|| ParseValueError::new("transition", value))
    }
}

// ============================================================================
// SECTION: Transition Table
// ============================================================================

/// Effect a transition has on the resolution field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolutionEffect {
    /// Resolution becomes absent.
    Clear,
    /// Resolution is set to the given value.
    Set(Resolution),
    /// Resolution is left untouched.
    Keep,
}

/// One row of the workflow table.
#[derive(Debug, Clone, Copy)]
struct TransitionRule {
    /// Transition name.
    transition: Transition,
    /// Statuses the transition may leave from.
    from: &'static [IssueStatus],
    /// Status reached.
    to: IssueStatus,
    /// Effect on the resolution.
    resolution: ResolutionEffect,
}

/// Statuses from which an issue can be acted upon before resolution.
const UNRESOLVED: &[IssueStatus] =
    &[IssueStatus::Open, IssueStatus::Reopened, IssueStatus::Confirmed];

/// The workflow table, in listing order.
const TABLE: [TransitionRule; 7] = [
    TransitionRule {
        transition: Transition::Confirm,
        from: &[IssueStatus::Open, IssueStatus::Reopened],
        to: IssueStatus::Confirmed,
        resolution: ResolutionEffect::Clear,
    },
    TransitionRule {
        transition: Transition::Unconfirm,
        from: &[IssueStatus::Confirmed],
        to: IssueStatus::Reopened,
        resolution: ResolutionEffect::Clear,
    },
    TransitionRule {
        transition: Transition::Resolve,
        from: UNRESOLVED,
        to: IssueStatus::Resolved,
        resolution: ResolutionEffect::Set(Resolution::Fixed),
    },
    TransitionRule {
        transition: Transition::Reopen,
        from: &[IssueStatus::Resolved, IssueStatus::Closed],
        to: IssueStatus::Reopened,
        resolution: ResolutionEffect::Clear,
    },
    TransitionRule {
        transition: Transition::FalsePositive,
        from: UNRESOLVED,
        to: IssueStatus::Resolved,
        resolution: ResolutionEffect::Set(Resolution::FalsePositive),
    },
    TransitionRule {
        transition: Transition::WontFix,
        from: UNRESOLVED,
        to: IssueStatus::Resolved,
        resolution: ResolutionEffect::Set(Resolution::WontFix),
    },
    TransitionRule {
        transition: Transition::Close,
        from: &[IssueStatus::Resolved],
        to: IssueStatus::Closed,
        resolution: ResolutionEffect::Keep,
    },
];

// ============================================================================
// SECTION: Workflow State
// ============================================================================

/// The two fields the workflow reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Issue status.
    pub status: IssueStatus,
    /// Issue resolution.
    pub resolution: Option<Resolution>,
}

impl WorkflowState {
    /// Creates a workflow state.
    #[must_use]
    pub const fn new(status: IssueStatus, resolution: Option<Resolution>) -> Self {
        Self {
            status,
            resolution,
        }
    }
}

/// Requested transition is not offered from the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transition '{transition}' is not allowed from status {status}")]
pub struct IllegalTransitionError {
    /// Requested transition.
    pub transition: Transition,
    /// Status the issue was in.
    pub status: IssueStatus,
}

/// Returns the transitions offered from `state`, in table order.
#[must_use]
pub fn list_transitions(state: WorkflowState) -> Vec<Transition> {
    TABLE
        .iter()
        .filter(|rule| rule.from.contains(&state.status))
        .map(|rule| rule.transition)
        .collect()
}

/// Applies `transition` to `state`.
///
/// # Errors
///
/// Returns [`IllegalTransitionError`] when the transition is not offered from `state`.
pub fn apply_transition(
    state: WorkflowState,
    transition: Transition,
) -> Result<WorkflowState, IllegalTransitionError> {
    let rule = TABLE
        .iter()
        .find(|rule| rule.transition == transition && rule.from.contains(&state.status))
        .ok_or(IllegalTransitionError {
            transition,
            status: state.status,
        })?;
    let resolution = match rule.resolution {
        ResolutionEffect::Clear => None,
        ResolutionEffect::Set(value) => Some(value),
        ResolutionEffect::Keep => state.resolution,
    };
    Ok(WorkflowState::new(rule.to, resolution))
}

/// Returns the fixed listing order of statuses.
#[must_use]
pub fn list_statuses() -> Vec<IssueStatus> {
    IssueStatus::ALL.to_vec()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn every_table_row_is_reachable_through_apply() {
        for rule in TABLE {
            for status in rule.from {
                let next = apply_transition(WorkflowState::new(*status, None), rule.transition)
                    .expect("listed transition applies");
                assert_eq!(next.status, rule.to);
            }
        }
    }

    #[test]
    fn close_keeps_resolution() {
        let state = WorkflowState::new(IssueStatus::Resolved, Some(Resolution::WontFix));
        let next = apply_transition(state, Transition::Close).unwrap();
        assert_eq!(next, WorkflowState::new(IssueStatus::Closed, Some(Resolution::WontFix)));
    }
}
