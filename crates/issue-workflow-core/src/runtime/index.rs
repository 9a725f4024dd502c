// crates/issue-workflow-core/src/runtime/index.rs
// ============================================================================
// Module: In-Memory Search Index
// Description: Filtered, faceted, paged search over indexed issue documents.
// Purpose: Provide a deterministic Search Index for tests and embedding.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryIssueIndex`] stores one [`IssueDoc`] per key and evaluates
//! queries by scanning. Ordering is fully deterministic: hits default to
//! newest first with key order breaking ties, and facet buckets follow
//! [`FacetCounts`] ordering.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::FacetCounts;
use crate::core::FacetField;
use crate::core::IssueDoc;
use crate::core::IssueKey;
use crate::core::IssueQuery;
use crate::core::SearchRequest;
use crate::core::SearchResult;
use crate::core::SortField;
use crate::core::SortOrder;
use crate::interfaces::IndexError;
use crate::interfaces::SearchIndex;

// ============================================================================
// SECTION: In-Memory Index
// ============================================================================

/// In-memory search index.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIssueIndex {
    /// Documents by key.
    docs: Arc<Mutex<BTreeMap<IssueKey, IssueDoc>>>,
}

impl InMemoryIssueIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the index lock is poisoned.
    pub fn len(&self) -> Result<usize, IndexError> {
        Ok(self.lock()?.len())
    }

    /// Returns true when nothing is indexed.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the index lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.lock()?.is_empty())
    }

    /// Acquires the document lock.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<IssueKey, IssueDoc>>, IndexError> {
        self.docs
            .lock()
            .map_err(|_| IndexError::Unavailable("search index mutex poisoned".to_string()))
    }
}

impl SearchIndex for InMemoryIssueIndex {
    fn index(&self, doc: IssueDoc) -> Result<(), IndexError> {
        self.lock()?.insert(doc.key.clone(), doc);
        Ok(())
    }

    fn remove(&self, key: &IssueKey) -> Result<(), IndexError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<IssueKey>, IndexError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn get_by_key(&self, key: &IssueKey) -> Result<Option<IssueDoc>, IndexError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResult, IndexError> {
        let guard = self.lock()?;
        let mut matching: Vec<&IssueDoc> =
            guard.values().filter(|doc| request.query.matches(doc)).collect();
        matching.sort_by(|a, b| compare_hits(a, b, request.sort));
        let facets = request
            .facets
            .iter()
            .map(|field| {
                (field.name().to_string(), FacetCounts::aggregate(*field, matching.iter().copied()))
            })
            .collect();
        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let hits = matching
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .cloned()
            .collect();
        Ok(SearchResult {
            total,
            hits,
            facets,
        })
    }

    fn list_tags(&self, substring: Option<&str>, size: usize) -> Result<Vec<String>, IndexError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let guard = self.lock()?;
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for tag in guard.values().flat_map(|doc| doc.tags.iter()) {
            if substring.is_none_or(|needle| tag.contains(needle)) {
                *counts.entry(tag.as_str()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        Ok(ranked.into_iter().take(size).map(|(tag, _)| tag.to_string()).collect())
    }

    fn facet(&self, query: &IssueQuery, field: FacetField) -> Result<FacetCounts, IndexError> {
        let guard = self.lock()?;
        Ok(FacetCounts::aggregate(field, guard.values().filter(|doc| query.matches(doc))))
    }
}

/// Orders hits by the requested field, newest first by default, key ascending on ties.
fn compare_hits(a: &IssueDoc, b: &IssueDoc, sort: Option<SortOrder>) -> Ordering {
    let primary = match sort {
        None => b.created_at.cmp(&a.created_at),
        Some(order) => {
            let ordering = match order.field {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Severity => a.severity.cmp(&b.severity),
            };
            if order.ascending { ordering } else { ordering.reverse() }
        }
    };
    primary.then_with(|| a.key.cmp(&b.key))
}
