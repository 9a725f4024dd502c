// crates/issue-workflow-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Issue Store
// Description: Durable IssueStore backend using SQLite WAL.
// Purpose: Provide persistent issue rows and changelog for the issue service.
// Dependencies: issue-workflow-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`IssueStore`] implementation. Issue
//! rows and changelog entries are stored as JSON payloads alongside the key
//! and timestamp columns the store owns.
//!
//! [`IssueStore`]: issue_workflow_core::IssueStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_ISSUE_BYTES;
pub use store::SqliteIssueStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
