// crates/issue-workflow-core/src/core/query.rs
// ============================================================================
// Module: Issue Queries and Facets
// Description: Search filters, query context, facets, and search results.
// Purpose: Describe read-path requests and their aggregated answers.
// Dependencies: crate::core::{identifiers, issue, time}, serde
// ============================================================================

//! ## Overview
//! An [`IssueQuery`] is a conjunction of filters; every multi-valued filter
//! matches when the document carries any of the listed values. A
//! [`QueryContext`] selects facets, paging, and ordering. Facet buckets are
//! ordered by descending count, then present values before the absent
//! bucket, then lexical value order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActionPlanKey;
use crate::core::identifiers::ComponentKey;
use crate::core::identifiers::ComponentUuid;
use crate::core::identifiers::Login;
use crate::core::identifiers::ProjectUuid;
use crate::core::identifiers::RuleKey;
use crate::core::issue::IssueDoc;
use crate::core::issue::IssueStatus;
use crate::core::issue::ParseValueError;
use crate::core::issue::Resolution;
use crate::core::issue::Severity;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Issue Query
// ============================================================================

/// Conjunctive issue filter. Empty lists do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueQuery {
    /// Root project UUIDs.
    pub project_uuids: Vec<ProjectUuid>,
    /// Component keys.
    pub component_keys: Vec<ComponentKey>,
    /// Component UUIDs.
    pub component_uuids: Vec<ComponentUuid>,
    /// Rule keys.
    pub rules: Vec<RuleKey>,
    /// Severities.
    pub severities: Vec<Severity>,
    /// Statuses.
    pub statuses: Vec<IssueStatus>,
    /// Resolutions.
    pub resolutions: Vec<Resolution>,
    /// Assignee logins.
    pub assignees: Vec<Login>,
    /// Tags (any of).
    pub tags: Vec<String>,
    /// Action plan keys.
    pub action_plans: Vec<ActionPlanKey>,
    /// Whether the issue must (or must not) have an assignee.
    pub assigned: Option<bool>,
    /// Whether the issue must (or must not) be planned.
    pub planned: Option<bool>,
    /// Whether the issue must (or must not) carry an effective resolution.
    pub resolved: Option<bool>,
    /// Only issues created strictly after this instant.
    pub created_after: Option<Timestamp>,
}

impl IssueQuery {
    /// Starts a query builder.
    #[must_use]
    pub fn builder() -> IssueQueryBuilder {
        IssueQueryBuilder::default()
    }

    /// Returns true when `doc` satisfies every filter.
    #[must_use]
    pub fn matches(&self, doc: &IssueDoc) -> bool {
        any_of(&self.project_uuids, &doc.project_uuid)
            && any_of(&self.component_keys, &doc.component_key)
            && any_of(&self.component_uuids, &doc.component_uuid)
            && any_of(&self.rules, &doc.rule_key)
            && any_of(&self.severities, &doc.severity)
            && any_of(&self.statuses, &doc.status)
            && optional_any_of(&self.resolutions, doc.resolution.as_ref())
            && optional_any_of(&self.assignees, doc.assignee.as_ref())
            && optional_any_of(&self.action_plans, doc.action_plan_key.as_ref())
            && (self.tags.is_empty() || self.tags.iter().any(|tag| doc.tags.contains(tag)))
            && self.assigned.is_none_or(|flag| flag == doc.assignee.is_some())
            && self.planned.is_none_or(|flag| flag == doc.action_plan_key.is_some())
            && self.resolved.is_none_or(|flag| flag == doc.is_resolved())
            && self.created_after.is_none_or(|after| doc.created_at > after)
    }
}

/// Returns true when `filter` is empty or contains `value`.
fn any_of<T: PartialEq>(filter: &[T], value: &T) -> bool {
    filter.is_empty() || filter.contains(value)
}

/// Returns true when `filter` is empty or contains the present `value`.
fn optional_any_of<T: PartialEq>(filter: &[T], value: Option<&T>) -> bool {
    filter.is_empty() || value.is_some_and(|value| filter.contains(value))
}

/// Builder for [`IssueQuery`].
#[derive(Debug, Clone, Default)]
pub struct IssueQueryBuilder {
    /// Query under construction.
    query: IssueQuery,
}

impl IssueQueryBuilder {
    /// Restricts to the given root projects.
    #[must_use]
    pub fn project_uuids(mut self, values: impl IntoIterator<Item = ProjectUuid>) -> Self {
        self.query.project_uuids.extend(values);
        self
    }

    /// Restricts to the given component keys.
    #[must_use]
    pub fn component_keys(mut self, values: impl IntoIterator<Item = ComponentKey>) -> Self {
        self.query.component_keys.extend(values);
        self
    }

    /// Restricts to the given component UUIDs.
    #[must_use]
    pub fn component_uuids(mut self, values: impl IntoIterator<Item = ComponentUuid>) -> Self {
        self.query.component_uuids.extend(values);
        self
    }

    /// Restricts to the given rules.
    #[must_use]
    pub fn rules(mut self, values: impl IntoIterator<Item = RuleKey>) -> Self {
        self.query.rules.extend(values);
        self
    }

    /// Restricts to the given severities.
    #[must_use]
    pub fn severities(mut self, values: impl IntoIterator<Item = Severity>) -> Self {
        self.query.severities.extend(values);
        self
    }

    /// Restricts to the given statuses.
    #[must_use]
    pub fn statuses(mut self, values: impl IntoIterator<Item = IssueStatus>) -> Self {
        self.query.statuses.extend(values);
        self
    }

    /// Restricts to the given resolutions.
    #[must_use]
    pub fn resolutions(mut self, values: impl IntoIterator<Item = Resolution>) -> Self {
        self.query.resolutions.extend(values);
        self
    }

    /// Restricts to the given assignees.
    #[must_use]
    pub fn assignees(mut self, values: impl IntoIterator<Item = Login>) -> Self {
        self.query.assignees.extend(values);
        self
    }

    /// Restricts to issues carrying any of the given tags.
    #[must_use]
    pub fn tags<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.query.tags.extend(values.into_iter().map(Into::into));
        self
    }

    /// Restricts to the given action plans.
    #[must_use]
    pub fn action_plans(mut self, values: impl IntoIterator<Item = ActionPlanKey>) -> Self {
        self.query.action_plans.extend(values);
        self
    }

    /// Restricts on assignee presence.
    #[must_use]
    pub const fn assigned(mut self, assigned: bool) -> Self {
        self.query.assigned = Some(assigned);
        self
    }

    /// Restricts on action plan presence.
    #[must_use]
    pub const fn planned(mut self, planned: bool) -> Self {
        self.query.planned = Some(planned);
        self
    }

    /// Restricts on effective resolution presence.
    #[must_use]
    pub const fn resolved(mut self, resolved: bool) -> Self {
        self.query.resolved = Some(resolved);
        self
    }

    /// Restricts to issues created strictly after `after`.
    #[must_use]
    pub const fn created_after(mut self, after: Timestamp) -> Self {
        self.query.created_after = Some(after);
        self
    }

    /// Finishes the query.
    #[must_use]
    pub fn build(self) -> IssueQuery {
        self.query
    }
}

// ============================================================================
// SECTION: Facets
// ============================================================================

/// Field a facet aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FacetField {
    /// Root project UUID.
    #[serde(rename = "projectUuids")]
    Projects,
    /// Component UUID.
    #[serde(rename = "componentUuids")]
    Components,
    /// Rule key.
    #[serde(rename = "rules")]
    Rules,
    /// Severity.
    #[serde(rename = "severities")]
    Severities,
    /// Status.
    #[serde(rename = "statuses")]
    Statuses,
    /// Resolution (absent bucket for unresolved issues).
    #[serde(rename = "resolutions")]
    Resolutions,
    /// Assignee (absent bucket for unassigned issues).
    #[serde(rename = "assignees")]
    Assignees,
    /// Action plan (absent bucket for unplanned issues).
    #[serde(rename = "actionPlans")]
    ActionPlans,
    /// Tags (multi-valued; untagged issues contribute nothing).
    #[serde(rename = "tags")]
    Tags,
}

impl FacetField {
    /// All facet fields.
    pub const ALL: [Self; 9] = [
        Self::Projects,
        Self::Components,
        Self::Rules,
        Self::Severities,
        Self::Statuses,
        Self::Resolutions,
        Self::Assignees,
        Self::ActionPlans,
        Self::Tags,
    ];

    /// Returns the facet name used by callers.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Projects => "projectUuids",
            Self::Components => "componentUuids",
            Self::Rules => "rules",
            Self::Severities => "severities",
            Self::Statuses => "statuses",
            Self::Resolutions => "resolutions",
            Self::Assignees => "assignees",
            Self::ActionPlans => "actionPlans",
            Self::Tags => "tags",
        }
    }

    /// Returns the values `doc` contributes to this facet.
    ///
    /// `None` entries feed the absent-value bucket.
    #[must_use]
    pub fn values_of(self, doc: &IssueDoc) -> Vec<Option<String>> {
        match self {
            Self::Projects => vec![Some(doc.project_uuid.to_string())],
            Self::Components => vec![Some(doc.component_uuid.to_string())],
            Self::Rules => vec![Some(doc.rule_key.to_string())],
            Self::Severities => vec![Some(doc.severity.to_string())],
            Self::Statuses => vec![Some(doc.status.to_string())],
            Self::Resolutions => vec![doc.resolution.map(|value| value.to_string())],
            Self::Assignees => vec![doc.assignee.as_ref().map(ToString::to_string)],
            Self::ActionPlans => vec![doc.action_plan_key.as_ref().map(ToString::to_string)],
            Self::Tags => doc.tags.iter().cloned().map(Some).collect(),
        }
    }
}

impl fmt::Display for FacetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FacetField {
    type Err = ParseValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == value)
            .ok_or_else(|| ParseValueError::new("facet", value))
    }
}

/// One facet bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    /// Bucket value; `None` is the absent-value bucket.
    pub value: Option<String>,
    /// Number of matching documents.
    pub count: u64,
}

/// Ordered facet buckets.
///
/// # Invariants
/// - Buckets are sorted by descending count, present values before the
///   absent bucket, then lexical value order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCounts {
    /// Ordered buckets.
    buckets: Vec<FacetValue>,
}

impl FacetCounts {
    /// Aggregates `field` over `docs`.
    pub fn aggregate<'a>(field: FacetField, docs: impl IntoIterator<Item = &'a IssueDoc>) -> Self {
        let mut counts: BTreeMap<Option<String>, u64> = BTreeMap::new();
        for doc in docs {
            for value in field.values_of(doc) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
        Self::from_counts(counts)
    }

    /// Builds ordered buckets from raw counts.
    #[must_use]
    pub fn from_counts(counts: BTreeMap<Option<String>, u64>) -> Self {
        let mut buckets: Vec<FacetValue> = counts
            .into_iter()
            .map(|(value, count)| FacetValue {
                value,
                count,
            })
            .collect();
        buckets.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.value.is_none().cmp(&b.value.is_none()))
                .then_with(|| a.value.cmp(&b.value))
        });
        Self {
            buckets,
        }
    }

    /// Returns the ordered buckets.
    #[must_use]
    pub fn buckets(&self) -> &[FacetValue] {
        &self.buckets
    }

    /// Returns the bucket values in order.
    #[must_use]
    pub fn keys(&self) -> Vec<Option<&str>> {
        self.buckets.iter().map(|bucket| bucket.value.as_deref()).collect()
    }

    /// Returns the count for a present value (zero when unseen).
    #[must_use]
    pub fn count(&self, value: &str) -> u64 {
        self.count_of(Some(value))
    }

    /// Returns the count for a value or the absent bucket.
    #[must_use]
    pub fn count_of(&self, value: Option<&str>) -> u64 {
        self.buckets
            .iter()
            .find(|bucket| bucket.value.as_deref() == value)
            .map_or(0, |bucket| bucket.count)
    }

    /// Returns the number of buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns true when no bucket exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

// ============================================================================
// SECTION: Query Context
// ============================================================================

/// Sortable fields for search hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Creation time.
    CreatedAt,
    /// Last update time.
    UpdatedAt,
    /// Severity.
    Severity,
}

/// Requested hit ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    /// Field to order by.
    pub field: SortField,
    /// Ascending when true.
    pub ascending: bool,
}

/// Facets, paging, and ordering for a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    /// Requested facet names, in request order.
    pub facets: Vec<String>,
    /// Number of hits to skip.
    pub offset: usize,
    /// Maximum hits to return; the service default applies when absent.
    pub limit: Option<usize>,
    /// Optional ordering; defaults to newest first.
    pub sort: Option<SortOrder>,
}

impl QueryContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the named facets.
    #[must_use]
    pub fn add_facets<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.facets.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets paging.
    #[must_use]
    pub const fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Sets ordering.
    #[must_use]
    pub const fn with_sort(mut self, field: SortField, ascending: bool) -> Self {
        self.sort = Some(SortOrder {
            field,
            ascending,
        });
        self
    }
}

/// Index-level search request with resolved facets and a concrete page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Filters.
    pub query: IssueQuery,
    /// Facets to compute over all matching documents.
    pub facets: Vec<FacetField>,
    /// Hits to skip.
    pub offset: usize,
    /// Maximum hits to return.
    pub limit: usize,
    /// Ordering.
    pub sort: Option<SortOrder>,
}

// ============================================================================
// SECTION: Search Result
// ============================================================================

/// Search answer: one page of hits plus facets over all matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Number of documents matching the query before paging.
    pub total: u64,
    /// The requested page of hits.
    pub hits: Vec<IssueDoc>,
    /// Requested facets keyed by facet name.
    pub facets: BTreeMap<String, FacetCounts>,
}

impl SearchResult {
    /// Returns the buckets of a facet, if it was requested.
    #[must_use]
    pub fn facet(&self, name: &str) -> Option<&FacetCounts> {
        self.facets.get(name)
    }

    /// Returns the bucket values of a facet (empty when not requested).
    #[must_use]
    pub fn facet_keys(&self, name: &str) -> Vec<Option<&str>> {
        self.facets.get(name).map_or_else(Vec::new, FacetCounts::keys)
    }
}
