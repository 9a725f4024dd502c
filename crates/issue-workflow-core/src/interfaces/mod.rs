// crates/issue-workflow-core/src/interfaces/mod.rs
// ============================================================================
// Module: Issue Workflow Interfaces
// Description: Backend-agnostic seams for storage, indexing, lookups, and time.
// Purpose: Define the contract surfaces consumed by the Issue Service.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The Issue Service talks to every collaborator through the traits in this
//! module: the authoritative [`IssueStore`], the derived [`SearchIndex`],
//! catalog lookups for rules, users, action plans and components, the
//! [`PermissionGate`], and a [`Clock`]. Implementations must fail closed:
//! infrastructure trouble is reported as an error, never as an empty answer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ActionPlan;
use crate::core::ActionPlanKey;
use crate::core::Component;
use crate::core::ComponentKey;
use crate::core::FacetCounts;
use crate::core::FacetField;
use crate::core::FieldDiff;
use crate::core::Issue;
use crate::core::IssueChange;
use crate::core::IssueDoc;
use crate::core::IssueKey;
use crate::core::IssueOperation;
use crate::core::IssueQuery;
use crate::core::Login;
use crate::core::Principal;
use crate::core::ProjectKey;
use crate::core::ProjectUuid;
use crate::core::Rule;
use crate::core::RuleKey;
use crate::core::SearchRequest;
use crate::core::SearchResult;
use crate::core::Timestamp;
use crate::core::User;

// ============================================================================
// SECTION: Issue Store
// ============================================================================

/// Issue store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No row exists for the addressed key.
    #[error("issue store: unknown issue: {0}")]
    NotFound(String),
    /// Insert collided with an existing key.
    #[error("issue store conflict: {0}")]
    Conflict(String),
    /// Store I/O error.
    #[error("issue store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("issue store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("issue store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("issue store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("issue store error: {0}")]
    Store(String),
}

/// System of record for issues and their changelog.
///
/// # Invariants
/// - `created_at` is stamped once on insert and never changes.
/// - `updated_at` strictly increases on every successful `update`.
/// - Each call is atomic; a bulk insert writes every issue or none.
pub trait IssueStore {
    /// Inserts new issues and returns them as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when any key already exists (nothing
    /// is written) or another [`StoreError`] when the write fails.
    fn insert(&self, issues: &[Issue]) -> Result<Vec<Issue>, StoreError>;

    /// Loads an issue by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn select_by_key(&self, key: &IssueKey) -> Result<Option<Issue>, StoreError>;

    /// Loads every issue in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn select_all(&self) -> Result<Vec<Issue>, StoreError>;

    /// Replaces the mutable fields of an existing issue and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the key does not exist or another
    /// [`StoreError`] when the write fails.
    fn update(&self, issue: &Issue) -> Result<Issue, StoreError>;

    /// Replaces the row like [`IssueStore::update`] and, when `diffs` is
    /// non-empty, appends a changelog entry by `user` stamped with the new
    /// `updated_at`. Both writes commit together or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the key does not exist or another
    /// [`StoreError`] when the write fails; nothing is written on error.
    fn update_with_change(
        &self,
        issue: &Issue,
        user: &Login,
        diffs: Vec<FieldDiff>,
    ) -> Result<Issue, StoreError>;

    /// Appends a changelog entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_change(&self, change: &IssueChange) -> Result<(), StoreError>;

    /// Loads the changelog of an issue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn select_changes(&self, key: &IssueKey) -> Result<Vec<IssueChange>, StoreError>;
}

// ============================================================================
// SECTION: Search Index
// ============================================================================

/// Search index errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Index backend is unreachable or failed.
    #[error("search index unavailable: {0}")]
    Unavailable(String),
    /// Request was rejected by the index.
    #[error("search index invalid request: {0}")]
    Invalid(String),
}

/// Queryable projection of issues.
///
/// # Invariants
/// - Indexing the same document twice yields the same observable state.
/// - Facets are computed over every document matching the query, not just
///   the returned page.
pub trait SearchIndex {
    /// Inserts or replaces the document for `doc.key`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the write fails.
    fn index(&self, doc: IssueDoc) -> Result<(), IndexError>;

    /// Drops the document for `key`; a missing document is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the write fails.
    fn remove(&self, key: &IssueKey) -> Result<(), IndexError>;

    /// Lists every indexed key in key order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the read fails.
    fn keys(&self) -> Result<Vec<IssueKey>, IndexError>;

    /// Loads an indexed document by key.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the read fails.
    fn get_by_key(&self, key: &IssueKey) -> Result<Option<IssueDoc>, IndexError>;

    /// Runs a filtered, paged search with facets.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the search fails.
    fn search(&self, request: &SearchRequest) -> Result<SearchResult, IndexError>;

    /// Lists up to `size` distinct tags, most used first, optionally
    /// restricted to tags containing `substring`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the read fails.
    fn list_tags(&self, substring: Option<&str>, size: usize) -> Result<Vec<String>, IndexError>;

    /// Aggregates `field` over every document matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the read fails.
    fn facet(&self, query: &IssueQuery, field: FacetField) -> Result<FacetCounts, IndexError>;
}

// ============================================================================
// SECTION: Catalog Lookups
// ============================================================================

/// Catalog lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Collaborator is unreachable or failed.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Rule repository lookup.
pub trait RuleLookup {
    /// Loads a rule by key.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the lookup fails.
    fn get_rule(&self, key: &RuleKey) -> Result<Option<Rule>, CatalogError>;
}

/// User directory lookup.
pub trait UserLookup {
    /// Loads a user by login.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the lookup fails.
    fn get_user_by_login(&self, login: &Login) -> Result<Option<User>, CatalogError>;
}

/// Action plan registry lookup.
pub trait ActionPlanLookup {
    /// Loads an action plan by key.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the lookup fails.
    fn get_action_plan(&self, key: &ActionPlanKey) -> Result<Option<ActionPlan>, CatalogError>;
}

/// Component tree lookup.
pub trait ComponentLookup {
    /// Loads a component by key.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the lookup fails.
    fn get_component(&self, key: &ComponentKey) -> Result<Option<Component>, CatalogError>;

    /// Loads the root project component identified by `uuid`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the lookup fails.
    fn get_project(&self, uuid: &ProjectUuid) -> Result<Option<Component>, CatalogError>;
}

/// Every collaborator lookup the Issue Service needs.
pub trait Catalog: RuleLookup + UserLookup + ActionPlanLookup + ComponentLookup {}

impl<T> Catalog for T where T: RuleLookup + UserLookup + ActionPlanLookup + ComponentLookup {}

// ============================================================================
// SECTION: Permission Gate
// ============================================================================

/// Project-scoped permission decision.
pub trait PermissionGate {
    /// Returns true when `principal` may perform `operation` on `project`.
    fn can_perform(
        &self,
        principal: &Principal,
        operation: IssueOperation,
        project: &ProjectKey,
    ) -> bool;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time source used by stores when stamping rows.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}
