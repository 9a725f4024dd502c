// crates/issue-workflow-core/src/core/changes.rs
// ============================================================================
// Module: Issue Changelog
// Description: Field-level diffs recorded for each issue mutation.
// Purpose: Keep an append-only history of who changed what and when.
// Dependencies: crate::core::{identifiers, issue, time}, serde
// ============================================================================

//! ## Overview
//! The service compares the issue before and after a mutation and records
//! one [`IssueChange`] holding a [`FieldDiff`] per tracked field that
//! changed. Mutations that change nothing record no entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::IssueKey;
use crate::core::identifiers::Login;
use crate::core::issue::Issue;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Field Diffs
// ============================================================================

/// Before and after values of one tracked field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Tracked field name (`status`, `resolution`, `assignee`, `actionPlan`, `severity`, `tags`).
    pub field: String,
    /// Value before the mutation.
    pub old_value: Option<String>,
    /// Value after the mutation.
    pub new_value: Option<String>,
}

/// One changelog entry.
///
/// # Invariants
/// - `diffs` is never empty for a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueChange {
    /// Issue the change applies to.
    pub issue_key: IssueKey,
    /// Principal that performed the change.
    pub user: Login,
    /// Time the change was persisted.
    pub created_at: Timestamp,
    /// Changed fields.
    pub diffs: Vec<FieldDiff>,
}

/// Computes the tracked-field diffs between two states of an issue.
#[must_use]
pub fn diff_issues(before: &Issue, after: &Issue) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    push_diff(
        &mut diffs,
        "status",
        Some(before.status.to_string()),
        Some(after.status.to_string()),
    );
    push_diff(
        &mut diffs,
        "resolution",
        before.resolution.map(|value| value.to_string()),
        after.resolution.map(|value| value.to_string()),
    );
    push_diff(
        &mut diffs,
        "assignee",
        before.assignee.as_ref().map(ToString::to_string),
        after.assignee.as_ref().map(ToString::to_string),
    );
    push_diff(
        &mut diffs,
        "actionPlan",
        before.action_plan_key.as_ref().map(ToString::to_string),
        after.action_plan_key.as_ref().map(ToString::to_string),
    );
    push_diff(
        &mut diffs,
        "severity",
        Some(before.severity.to_string()),
        Some(after.severity.to_string()),
    );
    push_diff(&mut diffs, "tags", join_tags(before), join_tags(after));
    diffs
}

/// Appends a diff when the values differ.
fn push_diff(
    diffs: &mut Vec<FieldDiff>,
    field: &str,
    old_value: Option<String>,
    new_value: Option<String>,
) {
    if old_value != new_value {
        diffs.push(FieldDiff {
            field: field.to_string(),
            old_value,
            new_value,
        });
    }
}

/// Renders a tag set as a space-separated list; `None` when empty.
fn join_tags(issue: &Issue) -> Option<String> {
    if issue.tags.is_empty() {
        return None;
    }
    Some(issue.tags.iter().map(String::as_str).collect::<Vec<_>>().join(" "))
}
