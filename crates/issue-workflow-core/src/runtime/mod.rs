// crates/issue-workflow-core/src/runtime/mod.rs
// ============================================================================
// Module: Issue Workflow Runtime
// Description: Issue Service orchestrator and in-memory collaborators.
// Purpose: Execute issue mutations and queries against the interface seams.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! Runtime modules implement the Issue Service together with in-memory
//! stores, index, catalog, permission gate, clocks, and audit sinks. The
//! in-memory pieces share state across clones so tests and embedding hosts
//! can observe what the service wrote.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod catalog;
pub mod clock;
pub mod index;
pub mod locks;
pub mod permissions;
pub mod service;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditOutcome;
pub use audit::IssueAuditEvent;
pub use audit::IssueAuditEventParams;
pub use audit::IssueAuditSink;
pub use audit::IssueFileAuditSink;
pub use audit::IssueMemoryAuditSink;
pub use audit::IssueNoopAuditSink;
pub use audit::IssueStderrAuditSink;
pub use catalog::InMemoryCatalog;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use clock::unix_millis;
pub use index::InMemoryIssueIndex;
pub use locks::KeyLocks;
pub use permissions::GrantSubject;
pub use permissions::ProjectRoleGate;
pub use permissions::RoleGrant;
pub use service::IssueErrorKind;
pub use service::IssueService;
pub use service::IssueServiceConfig;
pub use service::IssueServiceError;
pub use service::ManualIssueRequest;
pub use service::RuleCount;
pub use store::InMemoryIssueStore;
