// crates/issue-workflow-core/src/core/issue.rs
// ============================================================================
// Module: Issue Model
// Description: Issue rows, indexed issue documents, and their value enums.
// Purpose: Provide the canonical issue representation shared by store and index.
// Dependencies: crate::core::{identifiers, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! An [`Issue`] is the system-of-record row persisted by the Issue Store. An
//! [`IssueDoc`] is the queryable projection held by the Search Index. After any
//! successful mutation the document for a key mirrors the row field for field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::catalog::Component;
use crate::core::identifiers::ActionPlanKey;
use crate::core::identifiers::ComponentKey;
use crate::core::identifiers::ComponentUuid;
use crate::core::identifiers::IssueKey;
use crate::core::identifiers::Login;
use crate::core::identifiers::ProjectUuid;
use crate::core::identifiers::RuleKey;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Parse Errors
// ============================================================================

/// Error returned when a wire string does not name a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseValueError {
    /// Value family (severity, status, resolution, transition).
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
}

impl ParseValueError {
    /// Builds a parse error for the given value family.
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Issue severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational finding.
    Info,
    /// Minor finding.
    Minor,
    /// Major finding (default for manual issues).
    Major,
    /// Critical finding.
    Critical,
    /// Blocking finding.
    Blocker,
}

impl Severity {
    /// All severities from least to most severe.
    pub const ALL: [Self; 5] =
        [Self::Info, Self::Minor, Self::Major, Self::Critical, Self::Blocker];

    /// Returns the canonical wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Critical => "CRITICAL",
            Self::Blocker => "BLOCKER",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|severity| severity.as_str() == value)
            .ok_or_else(|| ParseValueError::new("severity", value))
    }
}

// ============================================================================
// SECTION: Status
// ============================================================================

/// Workflow status of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    /// Newly raised issue.
    Open,
    /// Issue acknowledged by a user.
    Confirmed,
    /// Issue reopened after resolution or closure.
    Reopened,
    /// Issue resolved; carries a resolution.
    Resolved,
    /// Issue closed for the current analysis cycle.
    Closed,
}

impl IssueStatus {
    /// All statuses in canonical listing order.
    pub const ALL: [Self; 5] =
        [Self::Open, Self::Confirmed, Self::Reopened, Self::Resolved, Self::Closed];

    /// Returns the canonical wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Confirmed => "CONFIRMED",
            Self::Reopened => "REOPENED",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = ParseValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| ParseValueError::new("status", value))
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolution attached to resolved (and possibly closed) issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// The finding was fixed.
    #[serde(rename = "FIXED")]
    Fixed,
    /// The finding is a false positive.
    #[serde(rename = "FALSE-POSITIVE")]
    FalsePositive,
    /// The finding disappeared with its component.
    #[serde(rename = "REMOVED")]
    Removed,
    /// The finding is accepted and will not be fixed.
    #[serde(rename = "WONTFIX")]
    WontFix,
    /// Explicit "no resolution" marker written by some ingestion paths.
    #[serde(rename = "NONE")]
    Unresolved,
}

impl Resolution {
    /// All resolutions.
    pub const ALL: [Self; 5] =
        [Self::Fixed, Self::FalsePositive, Self::Removed, Self::WontFix, Self::Unresolved];

    /// Returns the canonical wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "FIXED",
            Self::FalsePositive => "FALSE-POSITIVE",
            Self::Removed => "REMOVED",
            Self::WontFix => "WONTFIX",
            Self::Unresolved => "NONE",
        }
    }

    /// Returns true when the value denotes an actual resolution.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ParseValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|resolution| resolution.as_str() == value)
            .ok_or_else(|| ParseValueError::new("resolution", value))
    }
}

// ============================================================================
// SECTION: Issue Row
// ============================================================================

/// System-of-record issue row.
///
/// # Invariants
/// - `key` never changes after insert.
/// - `tags` holds normalized lowercase tokens only.
/// - `created_at`/`updated_at` are owned by the Issue Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue key.
    pub key: IssueKey,
    /// Rule the issue is raised against.
    pub rule_key: RuleKey,
    /// Issue severity.
    pub severity: Severity,
    /// Component key (file or module).
    pub component_key: ComponentKey,
    /// Component UUID.
    pub component_uuid: ComponentUuid,
    /// Root project UUID derived from the component.
    pub project_uuid: ProjectUuid,
    /// Optional 1-based line.
    pub line: Option<u32>,
    /// Optional effort estimate.
    pub effort_to_fix: Option<f64>,
    /// Workflow status.
    pub status: IssueStatus,
    /// Optional resolution.
    pub resolution: Option<Resolution>,
    /// Optional assignee login.
    pub assignee: Option<Login>,
    /// Optional action plan key.
    pub action_plan_key: Option<ActionPlanKey>,
    /// Normalized tag set.
    pub tags: BTreeSet<String>,
    /// Optional issue message.
    pub message: Option<String>,
    /// Reporter login for manually created issues.
    pub reporter: Option<Login>,
    /// Creation time, set on insert.
    pub created_at: Timestamp,
    /// Last update time, set on every write.
    pub updated_at: Timestamp,
}

impl Issue {
    /// Builds an open, unassigned `MAJOR` issue located on `component`.
    ///
    /// Timestamps start at zero and are stamped by the store on insert.
    #[must_use]
    pub fn new(key: IssueKey, rule_key: RuleKey, component: &Component) -> Self {
        Self {
            key,
            rule_key,
            severity: Severity::Major,
            component_key: component.key.clone(),
            component_uuid: component.uuid.clone(),
            project_uuid: component.project_uuid.clone(),
            line: None,
            effort_to_fix: None,
            status: IssueStatus::Open,
            resolution: None,
            assignee: None,
            action_plan_key: None,
            tags: BTreeSet::new(),
            message: None,
            reporter: None,
            created_at: Timestamp::from_unix_millis(0),
            updated_at: Timestamp::from_unix_millis(0),
        }
    }

    /// Returns true when the issue carries an effective resolution.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some_and(Resolution::is_resolved)
    }
}

// ============================================================================
// SECTION: Indexed Document
// ============================================================================

/// Search Index projection of an issue.
///
/// # Invariants
/// - Built only from a persisted [`Issue`] row; never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDoc {
    /// Issue key.
    pub key: IssueKey,
    /// Rule key.
    pub rule_key: RuleKey,
    /// Severity.
    pub severity: Severity,
    /// Component key.
    pub component_key: ComponentKey,
    /// Component UUID.
    pub component_uuid: ComponentUuid,
    /// Root project UUID.
    pub project_uuid: ProjectUuid,
    /// Optional line.
    pub line: Option<u32>,
    /// Optional effort estimate.
    pub effort_to_fix: Option<f64>,
    /// Workflow status.
    pub status: IssueStatus,
    /// Optional resolution.
    pub resolution: Option<Resolution>,
    /// Optional assignee.
    pub assignee: Option<Login>,
    /// Optional action plan key.
    pub action_plan_key: Option<ActionPlanKey>,
    /// Tag set.
    pub tags: BTreeSet<String>,
    /// Optional message.
    pub message: Option<String>,
    /// Optional reporter.
    pub reporter: Option<Login>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl IssueDoc {
    /// Returns true when the document carries an effective resolution.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some_and(Resolution::is_resolved)
    }
}

impl From<&Issue> for IssueDoc {
    fn from(issue: &Issue) -> Self {
        Self {
            key: issue.key.clone(),
            rule_key: issue.rule_key.clone(),
            severity: issue.severity,
            component_key: issue.component_key.clone(),
            component_uuid: issue.component_uuid.clone(),
            project_uuid: issue.project_uuid.clone(),
            line: issue.line,
            effort_to_fix: issue.effort_to_fix,
            status: issue.status,
            resolution: issue.resolution,
            assignee: issue.assignee.clone(),
            action_plan_key: issue.action_plan_key.clone(),
            tags: issue.tags.clone(),
            message: issue.message.clone(),
            reporter: issue.reporter.clone(),
            created_at: issue.created_at,
            updated_at: issue.updated_at,
        }
    }
}
