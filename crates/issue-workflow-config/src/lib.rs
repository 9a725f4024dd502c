// crates/issue-workflow-config/src/lib.rs
// ============================================================================
// Module: Issue Workflow Config Library
// Description: Canonical config model, validation, and runtime builders.
// Purpose: Single source of truth for issue-workflow.toml semantics.
// Dependencies: issue-workflow-core, issue-workflow-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `issue-workflow-config` defines the canonical configuration model for the
//! issue service. It provides strict, fail-closed validation and builders for
//! the store, audit sink, permission gate, and service limits.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
