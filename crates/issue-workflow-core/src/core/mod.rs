// crates/issue-workflow-core/src/core/mod.rs
// ============================================================================
// Module: Issue Workflow Core Types
// Description: Canonical issue, workflow, catalog, query, and changelog types.
// Purpose: Provide stable, serializable types shared by stores, indexes, and the service.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! Core types describe issues and their workflow, the collaborator entities
//! the engine reads, search requests and their facet answers, and the
//! changelog. Everything here is pure data plus pure functions; persistence
//! and orchestration live in [`crate::runtime`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod catalog;
pub mod changes;
pub mod identifiers;
pub mod issue;
pub mod permissions;
pub mod query;
pub mod tags;
pub mod time;
pub mod workflow;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::ActionPlan;
pub use catalog::Component;
pub use catalog::Rule;
pub use catalog::User;
pub use changes::FieldDiff;
pub use changes::IssueChange;
pub use changes::diff_issues;
pub use identifiers::ActionPlanKey;
pub use identifiers::ComponentKey;
pub use identifiers::ComponentUuid;
pub use identifiers::IssueKey;
pub use identifiers::Login;
pub use identifiers::ProjectKey;
pub use identifiers::ProjectUuid;
pub use identifiers::RuleKey;
pub use issue::Issue;
pub use issue::IssueDoc;
pub use issue::IssueStatus;
pub use issue::ParseValueError;
pub use issue::Resolution;
pub use issue::Severity;
pub use permissions::IssueOperation;
pub use permissions::Principal;
pub use permissions::Role;
pub use query::FacetCounts;
pub use query::FacetField;
pub use query::FacetValue;
pub use query::IssueQuery;
pub use query::IssueQueryBuilder;
pub use query::QueryContext;
pub use query::SearchRequest;
pub use query::SearchResult;
pub use query::SortField;
pub use query::SortOrder;
pub use tags::TagError;
pub use tags::is_valid_tag;
pub use tags::normalize_tags;
pub use time::Timestamp;
pub use workflow::IllegalTransitionError;
pub use workflow::Transition;
pub use workflow::WorkflowState;
pub use workflow::apply_transition;
pub use workflow::list_statuses;
pub use workflow::list_transitions;
