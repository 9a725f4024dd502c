// crates/issue-workflow-core/src/lib.rs
// ============================================================================
// Module: Issue Workflow Core Library
// Description: Public API surface for the issue workflow engine.
// Purpose: Expose core types, interfaces, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Issue workflow core enforces the issue status state machine, gates every
//! mutation on project roles, and keeps the authoritative Issue Store and the
//! derived Search Index consistent after each mutation. Storage and indexing
//! backends plug in through [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::ActionPlanLookup;
pub use interfaces::Catalog;
pub use interfaces::CatalogError;
pub use interfaces::Clock;
pub use interfaces::ComponentLookup;
pub use interfaces::IndexError;
pub use interfaces::IssueStore;
pub use interfaces::PermissionGate;
pub use interfaces::RuleLookup;
pub use interfaces::SearchIndex;
pub use interfaces::StoreError;
pub use interfaces::UserLookup;
pub use runtime::AuditOutcome;
pub use runtime::GrantSubject;
pub use runtime::InMemoryCatalog;
pub use runtime::InMemoryIssueIndex;
pub use runtime::InMemoryIssueStore;
pub use runtime::IssueAuditEvent;
pub use runtime::IssueAuditSink;
pub use runtime::IssueErrorKind;
pub use runtime::IssueFileAuditSink;
pub use runtime::IssueMemoryAuditSink;
pub use runtime::IssueNoopAuditSink;
pub use runtime::IssueService;
pub use runtime::IssueServiceConfig;
pub use runtime::IssueServiceError;
pub use runtime::IssueStderrAuditSink;
pub use runtime::ManualClock;
pub use runtime::ManualIssueRequest;
pub use runtime::ProjectRoleGate;
pub use runtime::RoleGrant;
pub use runtime::RuleCount;
pub use runtime::SystemClock;
