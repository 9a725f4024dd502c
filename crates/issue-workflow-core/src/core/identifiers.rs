// crates/issue-workflow-core/src/core/identifiers.rs
// ============================================================================
// Module: Issue Workflow Identifiers
// Description: Canonical opaque identifiers for issues and their collaborators.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the string-based identifiers used throughout the issue
//! workflow engine. Identifiers are opaque and serialize as plain strings.
//! Validation happens at service boundaries rather than inside the wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares an opaque string identifier with the shared accessor surface.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier!(
    /// Globally unique issue key, immutable after creation.
    IssueKey
);

string_identifier!(
    /// Rule key in `repository:rule` form (for example `xoo:x1`).
    RuleKey
);

string_identifier!(
    /// Component key (file or module) as addressed by callers.
    ComponentKey
);

string_identifier!(
    /// Component UUID assigned by the component catalog.
    ComponentUuid
);

string_identifier!(
    /// UUID of the root project a component belongs to.
    ProjectUuid
);

string_identifier!(
    /// Project key used for permission scoping.
    ProjectKey
);

string_identifier!(
    /// User login.
    Login
);

string_identifier!(
    /// Action plan key.
    ActionPlanKey
);

impl RuleKey {
    /// Builds a rule key from its repository and rule parts.
    #[must_use]
    pub fn of(repository: &str, rule: &str) -> Self {
        Self(format!("{repository}:{rule}"))
    }
}

impl IssueKey {
    /// Generates a fresh random issue key.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
