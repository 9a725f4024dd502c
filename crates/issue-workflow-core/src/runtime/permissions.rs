// crates/issue-workflow-core/src/runtime/permissions.rs
// ============================================================================
// Module: Project Role Permission Gate
// Description: Role grants scoped to projects, for users and groups.
// Purpose: Decide whether a principal may mutate issues of a project.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`ProjectRoleGate`] holds role grants bound to a project and either a
//! user login or a group name. An operation is permitted when any grant
//! that applies to the principal satisfies the operation's required role.
//! The gate fails closed: a poisoned lock denies everything.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::RwLock;

use crate::core::IssueOperation;
use crate::core::Login;
use crate::core::Principal;
use crate::core::ProjectKey;
use crate::core::Role;
use crate::interfaces::PermissionGate;

// ============================================================================
// SECTION: Grants
// ============================================================================

/// Who a grant applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GrantSubject {
    /// A single user.
    User(Login),
    /// Every member of a group.
    Group(String),
}

impl GrantSubject {
    /// Returns true when the grant subject covers `principal`.
    fn covers(&self, principal: &Principal) -> bool {
        match self {
            Self::User(login) => *login == principal.login,
            Self::Group(group) => principal.groups.iter().any(|member_of| member_of == group),
        }
    }
}

/// One project-scoped role grant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleGrant {
    /// Project the grant is scoped to.
    pub project: ProjectKey,
    /// Grantee.
    pub subject: GrantSubject,
    /// Granted role.
    pub role: Role,
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Permission gate backed by project role grants.
///
/// # Invariants
/// - Clones share the same grants.
#[derive(Debug, Default, Clone)]
pub struct ProjectRoleGate {
    /// Grants currently in force.
    grants: Arc<RwLock<BTreeSet<RoleGrant>>>,
}

impl ProjectRoleGate {
    /// Creates a gate with no grants; every operation is denied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a grant. Returns false when the lock is poisoned.
    pub fn grant(&self, grant: RoleGrant) -> bool {
        self.grants.write().map(|mut grants| grants.insert(grant)).is_ok()
    }

    /// Grants `role` on `project` to a user.
    pub fn grant_user(
        &self,
        project: impl Into<ProjectKey>,
        login: impl Into<Login>,
        role: Role,
    ) -> bool {
        self.grant(RoleGrant {
            project: project.into(),
            subject: GrantSubject::User(login.into()),
            role,
        })
    }

    /// Grants `role` on `project` to a group.
    pub fn grant_group(
        &self,
        project: impl Into<ProjectKey>,
        group: impl Into<String>,
        role: Role,
    ) -> bool {
        self.grant(RoleGrant {
            project: project.into(),
            subject: GrantSubject::Group(group.into()),
            role,
        })
    }

    /// Removes a grant. Returns true when a grant was removed.
    pub fn revoke(&self, grant: &RoleGrant) -> bool {
        self.grants.write().map(|mut grants| grants.remove(grant)).unwrap_or(false)
    }

    /// Returns the roles held by `principal` on `project`.
    #[must_use]
    pub fn roles_of(&self, principal: &Principal, project: &ProjectKey) -> BTreeSet<Role> {
        let Ok(grants) = self.grants.read() else {
            return BTreeSet::new();
        };
        grants
            .iter()
            .filter(|grant| grant.project == *project && grant.subject.covers(principal))
            .map(|grant| grant.role)
            .collect()
    }
}

impl PermissionGate for ProjectRoleGate {
    fn can_perform(
        &self,
        principal: &Principal,
        operation: IssueOperation,
        project: &ProjectKey,
    ) -> bool {
        let required = operation.required_role();
        self.roles_of(principal, project).into_iter().any(|role| role.satisfies(required))
    }
}
