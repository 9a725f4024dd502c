// crates/issue-workflow-core/src/core/catalog.rs
// ============================================================================
// Module: Catalog Entities
// Description: Rules, users, action plans, and components owned by collaborators.
// Purpose: Describe the narrow views the issue workflow consumes from outside.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! These records are produced by external collaborators (rule repository,
//! user directory, action plan registry, component tree). The engine reads
//! them through [`crate::interfaces`] lookups and never mutates them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActionPlanKey;
use crate::core::identifiers::ComponentKey;
use crate::core::identifiers::ComponentUuid;
use crate::core::identifiers::Login;
use crate::core::identifiers::ProjectKey;
use crate::core::identifiers::ProjectUuid;
use crate::core::identifiers::RuleKey;

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Rule an issue is raised against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule key.
    pub key: RuleKey,
    /// Display name; used as the default message of manual issues.
    pub name: String,
    /// Whether humans may create issues on this rule directly.
    pub manual: bool,
}

/// User known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login.
    pub login: Login,
    /// Display name.
    pub name: String,
}

/// Action plan an issue can be scheduled against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Action plan key.
    pub key: ActionPlanKey,
    /// Owning project.
    pub project_uuid: ProjectUuid,
}

/// Component (project, module, or file).
///
/// # Invariants
/// - A root project has `uuid == project_uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Component key.
    pub key: ComponentKey,
    /// Component UUID.
    pub uuid: ComponentUuid,
    /// UUID of the root project.
    pub project_uuid: ProjectUuid,
}

impl Component {
    /// Returns true when this component is a root project.
    #[must_use]
    pub fn is_project(&self) -> bool {
        self.uuid.as_str() == self.project_uuid.as_str()
    }

    /// Returns the project key when this component is a root project.
    #[must_use]
    pub fn as_project_key(&self) -> Option<ProjectKey> {
        self.is_project().then(|| ProjectKey::new(self.key.as_str()))
    }
}
