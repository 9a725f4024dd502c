// crates/issue-workflow-core/src/core/permissions.rs
// ============================================================================
// Module: Principals, Roles, and Operations
// Description: Value types consumed by the permission gate.
// Purpose: Name who acts, what they do, and which project roles they need.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Every Issue Service call receives an explicit [`Principal`]; there is no
//! ambient session. Project-scoped [`Role`] grants decide whether the
//! principal may perform an [`IssueOperation`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::Login;
use crate::core::issue::ParseValueError;

// ============================================================================
// SECTION: Principal
// ============================================================================

/// Authenticated actor on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Login of the actor.
    pub login: Login,
    /// Groups the actor belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principal {
    /// Creates a principal without group memberships.
    #[must_use]
    pub fn new(login: impl Into<Login>) -> Self {
        Self {
            login: login.into(),
            groups: Vec::new(),
        }
    }

    /// Adds a group membership.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Project-scoped role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Browse the project and act on its issues.
    User,
    /// Read source code only.
    CodeViewer,
    /// Administer issues.
    IssueAdmin,
    /// Administer the project.
    Admin,
}

impl Role {
    /// All roles.
    pub const ALL: [Self; 4] = [Self::User, Self::CodeViewer, Self::IssueAdmin, Self::Admin];

    /// Returns the stable role label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::CodeViewer => "codeviewer",
            Self::IssueAdmin => "issueadmin",
            Self::Admin => "admin",
        }
    }

    /// Returns true when holding `self` satisfies a requirement for `required`.
    ///
    /// `issueadmin` and `admin` imply `user`; `codeviewer` implies nothing else.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        match (self, required) {
            (Self::User, Self::User)
            | (Self::CodeViewer, Self::CodeViewer)
            | (Self::IssueAdmin, Self::IssueAdmin | Self::User)
            | (Self::Admin, _) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ParseValueError::new("role", value))
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Mutating operation subject to the permission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueOperation {
    /// Apply a workflow transition.
    Transition,
    /// Assign or unassign.
    Assign,
    /// Schedule to (or remove from) an action plan.
    Plan,
    /// Change severity.
    SetSeverity,
    /// Replace tags.
    SetTags,
    /// Create a manual issue.
    CreateManualIssue,
}

impl IssueOperation {
    /// Returns the stable operation label used in audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transition => "do_transition",
            Self::Assign => "assign",
            Self::Plan => "plan",
            Self::SetSeverity => "set_severity",
            Self::SetTags => "set_tags",
            Self::CreateManualIssue => "create_manual_issue",
        }
    }

    /// Returns the project role required to perform the operation.
    #[must_use]
    pub const fn required_role(self) -> Role {
        match self {
            Self::Transition
            | Self::Assign
            | Self::Plan
            | Self::SetSeverity
            | Self::SetTags
            | Self::CreateManualIssue => Role::User,
        }
    }
}

impl fmt::Display for IssueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
