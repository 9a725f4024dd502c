// crates/issue-workflow-core/src/runtime/service.rs
// ============================================================================
// Module: Issue Service
// Description: Orchestrates workflow, permissions, store, and index per call.
// Purpose: Own the dual-write contract between the Issue Store and Search Index.
// Dependencies: crate::{core, interfaces, runtime}, thiserror
// ============================================================================

//! ## Overview
//! [`IssueService`] is the only entry point that mutates issues. Each
//! mutation runs under the per-key lock of its issue:
//!
//! 1. load the current row from the store,
//! 2. resolve the owning project and consult the permission gate,
//! 3. validate and apply the change in memory,
//! 4. persist through the store and append a changelog entry,
//! 5. re-index the persisted row and return it as read back from the index.
//!
//! [`IssueService::index_all`] walks the keys one at a time under the same
//! locks, so a rebuild never overwrites a concurrent mutation with an older
//! row.
//!
//! The store is authoritative. When the index write fails after a store
//! write, the call fails, nothing is rolled back, and the audit event is
//! marked `index_diverged`; [`IssueService::reindex`] and
//! [`IssueService::index_all`] repair the index from the store.
//!
//! Read-only calls go straight to the index (or the workflow table).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ActionPlanKey;
use crate::core::ComponentKey;
use crate::core::FacetCounts;
use crate::core::FacetField;
use crate::core::IllegalTransitionError;
use crate::core::Issue;
use crate::core::IssueChange;
use crate::core::IssueDoc;
use crate::core::IssueKey;
use crate::core::IssueOperation;
use crate::core::IssueQuery;
use crate::core::IssueStatus;
use crate::core::Login;
use crate::core::Principal;
use crate::core::ProjectKey;
use crate::core::ProjectUuid;
use crate::core::QueryContext;
use crate::core::RuleKey;
use crate::core::SearchRequest;
use crate::core::SearchResult;
use crate::core::Severity;
use crate::core::Timestamp;
use crate::core::Transition;
use crate::core::WorkflowState;
use crate::core::apply_transition;
use crate::core::diff_issues;
use crate::core::list_statuses;
use crate::core::list_transitions;
use crate::core::normalize_tags;
use crate::interfaces::Catalog;
use crate::interfaces::CatalogError;
use crate::interfaces::IndexError;
use crate::interfaces::IssueStore;
use crate::interfaces::PermissionGate;
use crate::interfaces::SearchIndex;
use crate::interfaces::StoreError;
use crate::runtime::audit::AuditOutcome;
use crate::runtime::audit::IssueAuditEvent;
use crate::runtime::audit::IssueAuditEventParams;
use crate::runtime::audit::IssueAuditSink;
use crate::runtime::locks::KeyLocks;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default number of hits per search page.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 500;
/// Default maximum number of tags on one issue.
pub const DEFAULT_MAX_TAGS_PER_ISSUE: usize = 100;
/// Default maximum message length in characters.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4000;

/// Issue Service limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueServiceConfig {
    /// Hits per page when the caller does not ask for a limit.
    pub default_page_size: usize,
    /// Upper bound on any requested limit.
    pub max_page_size: usize,
    /// Maximum number of tags after normalization.
    pub max_tags_per_issue: usize,
    /// Maximum manual issue message length in characters.
    pub max_message_length: usize,
}

impl Default for IssueServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            max_tags_per_issue: DEFAULT_MAX_TAGS_PER_ISSUE,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

impl IssueServiceConfig {
    /// Validates the limits.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::InvalidArgument`] when a limit is zero or
    /// the default page size exceeds the maximum page size.
    pub fn validate(&self) -> Result<(), IssueServiceError> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(IssueServiceError::InvalidArgument(
                "page sizes must be greater than zero".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(IssueServiceError::InvalidArgument(format!(
                "default page size {} exceeds max page size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        if self.max_message_length == 0 {
            return Err(IssueServiceError::InvalidArgument(
                "max message length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Caller-facing classification of service failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueErrorKind {
    /// Unknown issue, user, action plan, component, or project.
    NotFound,
    /// Permission gate refused the call.
    Forbidden,
    /// Malformed input.
    InvalidArgument,
    /// Transition not offered from the current state.
    IllegalTransition,
    /// Issue Store failure.
    StoreUnavailable,
    /// Search Index failure.
    IndexUnavailable,
    /// Collaborator lookup failure.
    CatalogUnavailable,
}

impl IssueErrorKind {
    /// Returns the stable label used in audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::InvalidArgument => "invalid_argument",
            Self::IllegalTransition => "illegal_transition",
            Self::StoreUnavailable => "store_unavailable",
            Self::IndexUnavailable => "index_unavailable",
            Self::CatalogUnavailable => "catalog_unavailable",
        }
    }

    /// Returns true for transient infrastructure failures.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::StoreUnavailable | Self::IndexUnavailable | Self::CatalogUnavailable)
    }
}

/// Issue Service errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueServiceError {
    /// Addressed entity does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Principal lacks the required project role.
    #[error("{0}")]
    Forbidden(String),
    /// Input is malformed.
    #[error("{0}")]
    InvalidArgument(String),
    /// Several creation fields are invalid.
    #[error("{}", .0.join(", "))]
    InvalidArguments(Vec<String>),
    /// Transition is not offered from the current status.
    #[error("transition '{transition}' is not allowed from status {status}")]
    IllegalTransition {
        /// Requested transition.
        transition: Transition,
        /// Status the issue was in.
        status: IssueStatus,
    },
    /// Issue Store failure.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    /// Search Index failure.
    #[error(transparent)]
    IndexUnavailable(#[from] IndexError),
    /// Collaborator lookup failure.
    #[error(transparent)]
    CatalogUnavailable(#[from] CatalogError),
}

impl IssueServiceError {
    /// Returns the caller-facing classification.
    #[must_use]
    pub const fn kind(&self) -> IssueErrorKind {
        match self {
            Self::NotFound(_) => IssueErrorKind::NotFound,
            Self::Forbidden(_) => IssueErrorKind::Forbidden,
            Self::InvalidArgument(_) | Self::InvalidArguments(_) => IssueErrorKind::InvalidArgument,
            Self::IllegalTransition {
                ..
            } => IssueErrorKind::IllegalTransition,
            Self::StoreUnavailable(_) => IssueErrorKind::StoreUnavailable,
            Self::IndexUnavailable(_) => IssueErrorKind::IndexUnavailable,
            Self::CatalogUnavailable(_) => IssueErrorKind::CatalogUnavailable,
        }
    }
}

impl From<IllegalTransitionError> for IssueServiceError {
    fn from(err: IllegalTransitionError) -> Self {
        Self::IllegalTransition {
            transition: err.transition,
            status: err.status,
        }
    }
}

// ============================================================================
// SECTION: Requests and Aggregations
// ============================================================================

/// Input of [`IssueService::create_manual_issue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualIssueRequest {
    /// Component the issue is raised on.
    pub component_key: ComponentKey,
    /// Manual rule the issue is raised against.
    pub rule_key: RuleKey,
    /// One-based line, when the issue is located on a line.
    pub line: Option<i64>,
    /// Message; defaults to the rule name.
    pub message: Option<String>,
    /// Severity; defaults to `MAJOR`.
    pub severity: Option<Severity>,
    /// Remediation effort estimate.
    pub effort_to_fix: Option<f64>,
}

impl ManualIssueRequest {
    /// Creates a request with every optional field absent.
    #[must_use]
    pub fn new(component_key: impl Into<ComponentKey>, rule_key: RuleKey) -> Self {
        Self {
            component_key: component_key.into(),
            rule_key,
            line: None,
            message: None,
            severity: None,
            effort_to_fix: None,
        }
    }

    /// Sets the line.
    #[must_use]
    pub const fn line(mut self, line: i64) -> Self {
        self.line = Some(line);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the severity.
    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Sets the effort estimate.
    #[must_use]
    pub const fn effort_to_fix(mut self, effort: f64) -> Self {
        self.effort_to_fix = Some(effort);
        self
    }
}

/// Issue count of one rule on a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCount {
    /// Rule key.
    pub rule_key: RuleKey,
    /// Rule display name when the rule is still known.
    pub name: Option<String>,
    /// Number of matching issues.
    pub count: u64,
}

// ============================================================================
// SECTION: Issue Service
// ============================================================================

/// Issue workflow and search-index consistency engine.
///
/// # Invariants
/// - Mutations of one issue key never interleave.
/// - After a successful mutation the indexed document equals the stored row.
pub struct IssueService<S, I, G, C> {
    /// Authoritative issue store.
    store: S,
    /// Derived search index.
    index: I,
    /// Permission gate.
    gate: G,
    /// Collaborator lookups.
    catalog: C,
    /// Audit sink.
    audit: Arc<dyn IssueAuditSink>,
    /// Limits.
    config: IssueServiceConfig,
    /// Per-issue mutation locks.
    locks: KeyLocks,
}

impl<S, I, G, C> IssueService<S, I, G, C>
where
    S: IssueStore,
    I: SearchIndex,
    G: PermissionGate,
    C: Catalog,
{
    /// Creates a service.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::InvalidArgument`] when `config` is invalid.
    pub fn new(
        store: S,
        index: I,
        gate: G,
        catalog: C,
        audit: Arc<dyn IssueAuditSink>,
        config: IssueServiceConfig,
    ) -> Result<Self, IssueServiceError> {
        config.validate()?;
        Ok(Self {
            store,
            index,
            gate,
            catalog,
            audit,
            config,
            locks: KeyLocks::new(),
        })
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn config(&self) -> &IssueServiceConfig {
        &self.config
    }

    /// Returns the issue store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the search index.
    #[must_use]
    pub const fn index(&self) -> &I {
        &self.index
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Applies a workflow transition.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::IllegalTransition`] when the transition is
    /// not offered from the current status, plus the common mutation errors.
    pub fn do_transition(
        &self,
        principal: &Principal,
        key: &IssueKey,
        transition: Transition,
    ) -> Result<IssueDoc, IssueServiceError> {
        self.mutate(principal, key, IssueOperation::Transition, |issue| {
            let state = WorkflowState::new(issue.status, issue.resolution);
            let next = apply_transition(state, transition)?;
            let mut updated = issue.clone();
            updated.status = next.status;
            updated.resolution = next.resolution;
            Ok(updated)
        })
    }

    /// Assigns the issue to `login`; an absent or empty login unassigns it.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] (`Unknown user: <login>`) when
    /// the login is unknown, plus the common mutation errors.
    pub fn assign(
        &self,
        principal: &Principal,
        key: &IssueKey,
        login: Option<&str>,
    ) -> Result<IssueDoc, IssueServiceError> {
        let assignee = login.filter(|login| !login.is_empty()).map(Login::new);
        self.mutate(principal, key, IssueOperation::Assign, move |issue| {
            if let Some(login) = &assignee
                && self.catalog.get_user_by_login(login)?.is_none()
            {
                return Err(IssueServiceError::NotFound(format!("Unknown user: {login}")));
            }
            let mut updated = issue.clone();
            updated.assignee = assignee;
            Ok(updated)
        })
    }

    /// Schedules the issue to an action plan; an absent or empty key unplans it.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] (`Unknown action plan: <key>`)
    /// when the plan is unknown, plus the common mutation errors.
    pub fn plan(
        &self,
        principal: &Principal,
        key: &IssueKey,
        action_plan: Option<&str>,
    ) -> Result<IssueDoc, IssueServiceError> {
        let plan_key = action_plan.filter(|plan| !plan.is_empty()).map(ActionPlanKey::new);
        self.mutate(principal, key, IssueOperation::Plan, move |issue| {
            if let Some(plan_key) = &plan_key
                && self.catalog.get_action_plan(plan_key)?.is_none()
            {
                return Err(IssueServiceError::NotFound(format!("Unknown action plan: {plan_key}")));
            }
            let mut updated = issue.clone();
            updated.action_plan_key = plan_key;
            Ok(updated)
        })
    }

    /// Changes the severity.
    ///
    /// # Errors
    ///
    /// Returns the common mutation errors.
    pub fn set_severity(
        &self,
        principal: &Principal,
        key: &IssueKey,
        severity: Severity,
    ) -> Result<IssueDoc, IssueServiceError> {
        self.mutate(principal, key, IssueOperation::SetSeverity, |issue| {
            let mut updated = issue.clone();
            updated.severity = severity;
            Ok(updated)
        })
    }

    /// Replaces the tag set with the normalized form of `tags`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::InvalidArgument`] for malformed tokens or
    /// too many tags, plus the common mutation errors.
    pub fn set_tags<T, V>(
        &self,
        principal: &Principal,
        key: &IssueKey,
        tags: T,
    ) -> Result<IssueDoc, IssueServiceError>
    where
        T: IntoIterator<Item = Option<V>>,
        V: AsRef<str>,
    {
        let normalized = normalize_tags(tags, self.config.max_tags_per_issue)
            .map_err(|err| IssueServiceError::InvalidArgument(err.to_string()));
        self.mutate(principal, key, IssueOperation::SetTags, move |issue| {
            let mut updated = issue.clone();
            updated.tags = normalized?;
            Ok(updated)
        })
    }

    /// Creates a manual issue on a manual rule.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] for an unknown component,
    /// [`IssueServiceError::Forbidden`] without the required role,
    /// [`IssueServiceError::InvalidArgument`] for an unknown or non-manual
    /// rule, and [`IssueServiceError::InvalidArguments`] listing every invalid
    /// field.
    pub fn create_manual_issue(
        &self,
        principal: &Principal,
        request: ManualIssueRequest,
    ) -> Result<IssueDoc, IssueServiceError> {
        let mut project = None;
        let result = self.create_manual_issue_inner(principal, request, &mut project);
        let issue_key = result.as_ref().ok().map(|doc| doc.key.to_string());
        self.record_mutation(
            IssueOperation::CreateManualIssue,
            issue_key,
            principal,
            project.as_ref(),
            &result,
        );
        result
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Loads an indexed issue.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] when the key is not indexed.
    pub fn get_by_key(&self, key: &IssueKey) -> Result<IssueDoc, IssueServiceError> {
        self.index.get_by_key(key)?.ok_or_else(|| unknown_issue(key))
    }

    /// Runs a filtered, paged, faceted search.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::InvalidArgument`] for unknown facet names
    /// and [`IssueServiceError::IndexUnavailable`] when the index fails.
    pub fn search(
        &self,
        query: &IssueQuery,
        context: &QueryContext,
    ) -> Result<SearchResult, IssueServiceError> {
        let facets = context
            .facets
            .iter()
            .map(|name| {
                name.parse::<FacetField>().map_err(|_| {
                    IssueServiceError::InvalidArgument(format!("Unknown facet: {name}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let limit =
            context.limit.unwrap_or(self.config.default_page_size).min(self.config.max_page_size);
        let request = SearchRequest {
            query: query.clone(),
            facets,
            offset: context.offset,
            limit,
            sort: context.sort,
        };
        Ok(self.index.search(&request)?)
    }

    /// Returns the fixed status listing order.
    #[must_use]
    pub fn list_statuses(&self) -> Vec<IssueStatus> {
        list_statuses()
    }

    /// Returns the transitions offered for the indexed issue.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] when the key is not indexed.
    pub fn list_transitions(&self, key: &IssueKey) -> Result<Vec<Transition>, IssueServiceError> {
        let doc = self.get_by_key(key)?;
        Ok(list_transitions(WorkflowState::new(doc.status, doc.resolution)))
    }

    /// Lists up to `size` distinct tags, most used first. Non-positive sizes
    /// yield nothing.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::IndexUnavailable`] when the index fails.
    pub fn list_tags(
        &self,
        substring: Option<&str>,
        size: i64,
    ) -> Result<Vec<String>, IssueServiceError> {
        match usize::try_from(size) {
            Ok(size) if size > 0 => Ok(self.index.list_tags(substring, size)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Counts issues per rule on a component (a whole project when the
    /// component is a root project).
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] for an unknown component.
    pub fn find_rules_by_component(
        &self,
        component_key: &ComponentKey,
        created_after: Option<Timestamp>,
    ) -> Result<Vec<RuleCount>, IssueServiceError> {
        let query = self.component_query(component_key, created_after)?;
        let counts = self.index.facet(&query, FacetField::Rules)?;
        let mut rules = Vec::with_capacity(counts.len());
        for bucket in counts.buckets() {
            let Some(value) = bucket.value.as_deref() else {
                continue;
            };
            let rule_key = RuleKey::new(value);
            let name = self.catalog.get_rule(&rule_key)?.map(|rule| rule.name);
            rules.push(RuleCount {
                rule_key,
                name,
                count: bucket.count,
            });
        }
        Ok(rules)
    }

    /// Counts issues per severity on a component.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] for an unknown component.
    pub fn find_severities_by_component(
        &self,
        component_key: &ComponentKey,
        created_after: Option<Timestamp>,
    ) -> Result<FacetCounts, IssueServiceError> {
        let query = self.component_query(component_key, created_after)?;
        Ok(self.index.facet(&query, FacetField::Severities)?)
    }

    /// Counts matching issues per assignee, including an unassigned bucket.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::IndexUnavailable`] when the index fails.
    pub fn find_issue_assignees(
        &self,
        query: &IssueQuery,
    ) -> Result<FacetCounts, IssueServiceError> {
        Ok(self.index.facet(query, FacetField::Assignees)?)
    }

    /// Returns the changelog of an issue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] when the key is not stored.
    pub fn changelog(&self, key: &IssueKey) -> Result<Vec<IssueChange>, IssueServiceError> {
        self.load_issue(key)?;
        Ok(self.store.select_changes(key)?)
    }

    // ------------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------------

    /// Re-indexes one issue from the store.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::NotFound`] when the key is not stored.
    pub fn reindex(&self, key: &IssueKey) -> Result<IssueDoc, IssueServiceError> {
        let result = self
            .locks
            .with_key(key, || {
                let issue = self.load_issue(key)?;
                self.index_and_read_back(&issue)
            })
            .unwrap_or_else(|_| Err(lock_poisoned()));
        self.record_reindex("reindex", Some(key.to_string()), &result);
        result
    }

    /// Rebuilds the whole index from the store and returns the number of
    /// indexed issues.
    ///
    /// # Errors
    ///
    /// Returns [`IssueServiceError::StoreUnavailable`] or
    /// [`IssueServiceError::IndexUnavailable`] when either side fails.
    pub fn index_all(&self) -> Result<usize, IssueServiceError> {
        let result = self.rebuild_index();
        self.record_reindex("index_all", None, &result);
        result
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Runs one mutation under the issue lock and audits its outcome.
    fn mutate<F>(
        &self,
        principal: &Principal,
        key: &IssueKey,
        operation: IssueOperation,
        change: F,
    ) -> Result<IssueDoc, IssueServiceError>
    where
        F: FnOnce(&Issue) -> Result<Issue, IssueServiceError>,
    {
        let mut project = None;
        let result = self
            .locks
            .with_key(key, || self.mutate_locked(principal, key, operation, change, &mut project))
            .unwrap_or_else(|_| Err(lock_poisoned()));
        let issue_key = Some(key.to_string());
        self.record_mutation(operation, issue_key, principal, project.as_ref(), &result);
        result
    }

    /// Mutation pipeline; caller holds the issue lock.
    fn mutate_locked<F>(
        &self,
        principal: &Principal,
        key: &IssueKey,
        operation: IssueOperation,
        change: F,
        project_slot: &mut Option<ProjectKey>,
    ) -> Result<IssueDoc, IssueServiceError>
    where
        F: FnOnce(&Issue) -> Result<Issue, IssueServiceError>,
    {
        let current = self.load_issue(key)?;
        let project = self.project_key(&current.project_uuid)?;
        *project_slot = Some(project.clone());
        self.authorize(principal, operation, &project)?;
        let updated = change(&current)?;
        let diffs = diff_issues(&current, &updated);
        let stored = self.store.update_with_change(&updated, &principal.login, diffs)?;
        self.index_and_read_back(&stored)
    }

    /// Manual issue creation pipeline.
    fn create_manual_issue_inner(
        &self,
        principal: &Principal,
        request: ManualIssueRequest,
        project_slot: &mut Option<ProjectKey>,
    ) -> Result<IssueDoc, IssueServiceError> {
        let component = self.catalog.get_component(&request.component_key)?.ok_or_else(|| {
            IssueServiceError::NotFound(format!("Unknown component: {}", request.component_key))
        })?;
        let project = self.project_key(&component.project_uuid)?;
        *project_slot = Some(project.clone());
        self.authorize(principal, IssueOperation::CreateManualIssue, &project)?;
        let rule = self.catalog.get_rule(&request.rule_key)?.ok_or_else(|| {
            IssueServiceError::InvalidArgument(format!("Unknown rule: {}", request.rule_key))
        })?;
        if !rule.manual {
            return Err(IssueServiceError::InvalidArgument(format!(
                "Issues can be created only on rules marked as 'manual': {}",
                rule.key
            )));
        }
        let line = self.validate_manual_fields(&request)?;
        let mut issue = Issue::new(IssueKey::generate(), rule.key, &component);
        issue.severity = request.severity.unwrap_or(Severity::Major);
        issue.message =
            Some(request.message.filter(|message| !message.trim().is_empty()).unwrap_or(rule.name));
        issue.line = line;
        issue.effort_to_fix = request.effort_to_fix;
        issue.reporter = Some(principal.login.clone());
        let stored = self
            .store
            .insert(std::slice::from_ref(&issue))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Store("insert returned no row".to_string()))?;
        self.index_and_read_back(&stored)
    }

    /// Checks every manual issue field and returns the validated line.
    fn validate_manual_fields(
        &self,
        request: &ManualIssueRequest,
    ) -> Result<Option<u32>, IssueServiceError> {
        let mut errors = Vec::new();
        let line = match request.line {
            None => None,
            Some(line) => match u32::try_from(line) {
                Ok(valid) if valid >= 1 => Some(valid),
                _ => {
                    errors.push(format!("Line must be greater than or equal to 1: {line}"));
                    None
                }
            },
        };
        if let Some(effort) = request.effort_to_fix
            && (!effort.is_finite() || effort < 0.0)
        {
            errors.push(format!("Effort to fix must be a non-negative number: {effort}"));
        }
        if let Some(message) = &request.message
            && message.chars().count() > self.config.max_message_length
        {
            errors.push(format!(
                "Message must not exceed {} characters",
                self.config.max_message_length
            ));
        }
        if errors.is_empty() { Ok(line) } else { Err(IssueServiceError::InvalidArguments(errors)) }
    }

    /// Loads a stored issue.
    fn load_issue(&self, key: &IssueKey) -> Result<Issue, IssueServiceError> {
        self.store.select_by_key(key)?.ok_or_else(|| unknown_issue(key))
    }

    /// Resolves the key of the root project identified by `uuid`.
    fn project_key(&self, uuid: &ProjectUuid) -> Result<ProjectKey, IssueServiceError> {
        self.catalog
            .get_project(uuid)?
            .map(|project| ProjectKey::new(project.key.as_str()))
            .ok_or_else(|| IssueServiceError::NotFound(format!("Unknown project: {uuid}")))
    }

    /// Consults the permission gate.
    fn authorize(
        &self,
        principal: &Principal,
        operation: IssueOperation,
        project: &ProjectKey,
    ) -> Result<(), IssueServiceError> {
        if self.gate.can_perform(principal, operation, project) {
            Ok(())
        } else {
            Err(IssueServiceError::Forbidden("Insufficient privileges".to_string()))
        }
    }

    /// Indexes the stored row and returns the document read back from the index.
    fn index_and_read_back(&self, stored: &Issue) -> Result<IssueDoc, IssueServiceError> {
        self.index.index(IssueDoc::from(stored))?;
        self.index.get_by_key(&stored.key)?.ok_or_else(|| {
            IssueServiceError::IndexUnavailable(IndexError::Unavailable(format!(
                "indexed document missing after write: {}",
                stored.key
            )))
        })
    }

    /// Re-indexes every stored key, and drops indexed keys the store no
    /// longer holds, one key at a time under that key's lock.
    fn rebuild_index(&self) -> Result<usize, IssueServiceError> {
        let mut keys: BTreeSet<IssueKey> =
            self.store.select_all()?.into_iter().map(|issue| issue.key).collect();
        keys.extend(self.index.keys()?);
        let mut indexed = 0;
        for key in &keys {
            let present = self
                .locks
                .with_key(key, || self.sync_key(key))
                .unwrap_or_else(|_| Err(lock_poisoned()))?;
            if present {
                indexed += 1;
            }
        }
        Ok(indexed)
    }

    /// Copies the current row of `key` into the index; caller holds the key lock.
    fn sync_key(&self, key: &IssueKey) -> Result<bool, IssueServiceError> {
        match self.store.select_by_key(key)? {
            Some(issue) => {
                self.index.index(IssueDoc::from(&issue))?;
                Ok(true)
            }
            None => {
                self.index.remove(key)?;
                Ok(false)
            }
        }
    }

    /// Builds the query scoping aggregations to a component or project.
    fn component_query(
        &self,
        component_key: &ComponentKey,
        created_after: Option<Timestamp>,
    ) -> Result<IssueQuery, IssueServiceError> {
        let component = self.catalog.get_component(component_key)?.ok_or_else(|| {
            IssueServiceError::NotFound(format!("Unknown component: {component_key}"))
        })?;
        let mut query = if component.is_project() {
            IssueQuery::builder().project_uuids([component.project_uuid]).build()
        } else {
            IssueQuery::builder().component_keys([component.key]).build()
        };
        query.created_after = created_after;
        Ok(query)
    }

    /// Records the audit event of a mutation.
    fn record_mutation<T>(
        &self,
        operation: IssueOperation,
        issue_key: Option<String>,
        principal: &Principal,
        project: Option<&ProjectKey>,
        result: &Result<T, IssueServiceError>,
    ) {
        let (outcome, error_kind) = match result {
            Ok(_) => (AuditOutcome::Applied, None),
            Err(err) => (mutation_outcome(err.kind()), Some(err.kind().as_str())),
        };
        self.audit.record(&IssueAuditEvent::mutation(IssueAuditEventParams {
            operation: operation.as_str(),
            issue_key,
            principal: Some(principal.login.to_string()),
            project_key: project.map(ToString::to_string),
            outcome,
            error_kind,
        }));
    }

    /// Records the audit event of a re-index call.
    fn record_reindex<T>(
        &self,
        operation: &'static str,
        issue_key: Option<String>,
        result: &Result<T, IssueServiceError>,
    ) {
        let (outcome, error_kind) = match result {
            Ok(_) => (AuditOutcome::Applied, None),
            Err(err) if err.kind() == IssueErrorKind::NotFound => {
                (AuditOutcome::Rejected, Some(err.kind().as_str()))
            }
            Err(err) => (AuditOutcome::Failed, Some(err.kind().as_str())),
        };
        self.audit.record(&IssueAuditEvent::reindex(IssueAuditEventParams {
            operation,
            issue_key,
            principal: None,
            project_key: None,
            outcome,
            error_kind,
        }));
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Builds the unknown-issue error.
fn unknown_issue(key: &IssueKey) -> IssueServiceError {
    IssueServiceError::NotFound(format!("Unknown issue: {key}"))
}

/// Builds the error reported when a key lock is poisoned.
fn lock_poisoned() -> IssueServiceError {
    IssueServiceError::StoreUnavailable(StoreError::Store("issue key lock poisoned".to_string()))
}

/// Maps a failed mutation onto its audit outcome.
///
/// Index failures only happen after the store write in a mutation.
const fn mutation_outcome(kind: IssueErrorKind) -> AuditOutcome {
    match kind {
        IssueErrorKind::Forbidden => AuditOutcome::Denied,
        IssueErrorKind::NotFound
        | IssueErrorKind::InvalidArgument
        | IssueErrorKind::IllegalTransition => AuditOutcome::Rejected,
        IssueErrorKind::IndexUnavailable => AuditOutcome::IndexDiverged,
        IssueErrorKind::StoreUnavailable | IssueErrorKind::CatalogUnavailable => {
            AuditOutcome::Failed
        }
    }
}
