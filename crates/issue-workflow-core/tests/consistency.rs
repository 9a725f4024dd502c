// crates/issue-workflow-core/tests/consistency.rs
// ============================================================================
// Module: Dual-Write Consistency Tests
// Description: Permission gating, audit outcomes, index divergence, recovery.
// Purpose: Ensure failures leave no partial writes and divergence is repairable.
// Dependencies: issue-workflow-core
// ============================================================================

//! ## Overview
//! Exercises the failure paths of the Issue Service: denied principals,
//! index writes failing after a store write, operator re-indexing, and
//! concurrent mutations of the same issue.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::sync::Barrier;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use common::ACTION_PLAN_KEY;
use common::Fixture;
use common::PROJECT_KEY;
use issue_workflow_core::AuditOutcome;
use issue_workflow_core::FacetCounts;
use issue_workflow_core::FacetField;
use issue_workflow_core::FieldDiff;
use issue_workflow_core::IndexError;
use issue_workflow_core::InMemoryIssueIndex;
use issue_workflow_core::InMemoryIssueStore;
use issue_workflow_core::Issue;
use issue_workflow_core::IssueChange;
use issue_workflow_core::IssueDoc;
use issue_workflow_core::IssueErrorKind;
use issue_workflow_core::IssueKey;
use issue_workflow_core::IssueNoopAuditSink;
use issue_workflow_core::IssueQuery;
use issue_workflow_core::IssueService;
use issue_workflow_core::IssueServiceConfig;
use issue_workflow_core::IssueStatus;
use issue_workflow_core::IssueStore;
use issue_workflow_core::Login;
use issue_workflow_core::Principal;
use issue_workflow_core::Role;
use issue_workflow_core::SearchIndex;
use issue_workflow_core::SearchRequest;
use issue_workflow_core::SearchResult;
use issue_workflow_core::Severity;
use issue_workflow_core::StoreError;
use issue_workflow_core::Transition;

/// Index wrapper whose writes can be switched off.
#[derive(Clone, Default)]
struct FlakyIndex {
    inner: InMemoryIssueIndex,
    failing: Arc<AtomicBool>,
}

impl FlakyIndex {
    fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), IndexError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(IndexError::Unavailable("index offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SearchIndex for FlakyIndex {
    fn index(&self, doc: IssueDoc) -> Result<(), IndexError> {
        self.check()?;
        self.inner.index(doc)
    }

    fn remove(&self, key: &IssueKey) -> Result<(), IndexError> {
        self.check()?;
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<IssueKey>, IndexError> {
        self.inner.keys()
    }

    fn get_by_key(&self, key: &IssueKey) -> Result<Option<IssueDoc>, IndexError> {
        self.inner.get_by_key(key)
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResult, IndexError> {
        self.inner.search(request)
    }

    fn list_tags(&self, substring: Option<&str>, size: usize) -> Result<Vec<String>, IndexError> {
        self.inner.list_tags(substring, size)
    }

    fn facet(&self, query: &IssueQuery, field: FacetField) -> Result<FacetCounts, IndexError> {
        self.inner.facet(query, field)
    }
}

/// `(paused, resume)` barrier pair.
type Pause = (Arc<Barrier>, Arc<Barrier>);

/// Index that parks the next rebuild after it has listed the indexed keys.
#[derive(Clone, Default)]
struct PausingIndex {
    inner: InMemoryIssueIndex,
    pause: Arc<Mutex<Option<Pause>>>,
}

impl PausingIndex {
    /// Arms the pause and returns its barriers.
    fn arm(&self) -> Pause {
        let paused = Arc::new(Barrier::new(2));
        let resume = Arc::new(Barrier::new(2));
        *self.pause.lock().unwrap() = Some((Arc::clone(&paused), Arc::clone(&resume)));
        (paused, resume)
    }
}

impl SearchIndex for PausingIndex {
    fn index(&self, doc: IssueDoc) -> Result<(), IndexError> {
        self.inner.index(doc)
    }

    fn remove(&self, key: &IssueKey) -> Result<(), IndexError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<IssueKey>, IndexError> {
        let keys = self.inner.keys()?;
        let armed = self.pause.lock().unwrap().take();
        if let Some((paused, resume)) = armed {
            paused.wait();
            resume.wait();
        }
        Ok(keys)
    }

    fn get_by_key(&self, key: &IssueKey) -> Result<Option<IssueDoc>, IndexError> {
        self.inner.get_by_key(key)
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResult, IndexError> {
        self.inner.search(request)
    }

    fn list_tags(&self, substring: Option<&str>, size: usize) -> Result<Vec<String>, IndexError> {
        self.inner.list_tags(substring, size)
    }

    fn facet(&self, query: &IssueQuery, field: FacetField) -> Result<FacetCounts, IndexError> {
        self.inner.facet(query, field)
    }
}

/// Store whose recorded updates can be switched to fail before committing.
#[derive(Clone)]
struct RejectingChangelogStore {
    inner: InMemoryIssueStore,
    failing: Arc<AtomicBool>,
}

impl IssueStore for RejectingChangelogStore {
    fn insert(&self, issues: &[Issue]) -> Result<Vec<Issue>, StoreError> {
        self.inner.insert(issues)
    }

    fn select_by_key(&self, key: &IssueKey) -> Result<Option<Issue>, StoreError> {
        self.inner.select_by_key(key)
    }

    fn select_all(&self) -> Result<Vec<Issue>, StoreError> {
        self.inner.select_all()
    }

    fn update(&self, issue: &Issue) -> Result<Issue, StoreError> {
        self.inner.update(issue)
    }

    fn update_with_change(
        &self,
        issue: &Issue,
        user: &Login,
        diffs: Vec<FieldDiff>,
    ) -> Result<Issue, StoreError> {
        if self.failing.load(Ordering::SeqCst) && !diffs.is_empty() {
            return Err(StoreError::Io("changelog table unavailable".to_string()));
        }
        self.inner.update_with_change(issue, user, diffs)
    }

    fn insert_change(&self, change: &IssueChange) -> Result<(), StoreError> {
        self.inner.insert_change(change)
    }

    fn select_changes(&self, key: &IssueKey) -> Result<Vec<IssueChange>, StoreError> {
        self.inner.select_changes(key)
    }
}

#[test]
fn principal_without_role_is_forbidden_everywhere() {
    let fixture = Fixture::new();
    let key = fixture.ingest_one("ABCD");
    let before = fixture.service.get_by_key(&key).unwrap();
    let stranger = Principal::new("stranger");

    let results = [
        fixture.service.do_transition(&stranger, &key, Transition::Confirm),
        fixture.service.assign(&stranger, &key, Some("perceval")),
        fixture.service.plan(&stranger, &key, Some(ACTION_PLAN_KEY)),
        fixture.service.set_severity(&stranger, &key, Severity::Blocker),
        fixture.service.set_tags(&stranger, &key, [Some("bug")]),
    ];

    for result in results {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), IssueErrorKind::Forbidden);
    }
    assert_eq!(fixture.service.get_by_key(&key).unwrap(), before);
    assert_eq!(IssueDoc::from(&fixture.store.select_by_key(&key).unwrap().unwrap()), before);
    assert!(fixture.service.changelog(&key).unwrap().is_empty());
}

#[test]
fn codeviewer_role_does_not_grant_mutation() {
    let fixture = Fixture::new();
    let key = fixture.ingest_one("ABCD");
    assert!(fixture.gate.grant_user(PROJECT_KEY, "viewer", Role::CodeViewer));

    let err = fixture
        .service
        .set_severity(&Principal::new("viewer"), &key, Severity::Minor)
        .unwrap_err();

    assert_eq!(err.kind(), IssueErrorKind::Forbidden);
}

#[test]
fn group_grant_allows_members() {
    let fixture = Fixture::new();
    let key = fixture.ingest_one("ABCD");
    assert!(fixture.gate.grant_group(PROJECT_KEY, "anyone", Role::User));

    let member = Principal::new("visitor").with_group("anyone");
    let doc = fixture.service.set_severity(&member, &key, Severity::Minor).unwrap();

    assert_eq!(doc.severity, Severity::Minor);
}

#[test]
fn every_mutation_is_audited_once() {
    let fixture = Fixture::new();
    let key = fixture.ingest_one("ABCD");

    fixture.service.set_severity(&fixture.principal, &key, Severity::Minor).unwrap();
    let _ = fixture.service.set_severity(&Principal::new("stranger"), &key, Severity::Info);
    let _ = fixture.service.do_transition(&fixture.principal, &key, Transition::Reopen);

    let mutations: Vec<_> = fixture
        .audit
        .events()
        .into_iter()
        .filter(|event| event.event == "issue_mutation")
        .collect();
    let outcomes: Vec<_> = mutations.iter().map(|event| event.outcome).collect();
    assert_eq!(
        outcomes,
        vec![AuditOutcome::Applied, AuditOutcome::Denied, AuditOutcome::Rejected]
    );
    assert_eq!(mutations[0].operation, "set_severity");
    assert_eq!(mutations[0].project_key.as_deref(), Some(PROJECT_KEY));
    assert_eq!(mutations[1].principal.as_deref(), Some("stranger"));
    assert_eq!(mutations[1].error_kind, Some("forbidden"));
    assert_eq!(mutations[2].error_kind, Some("illegal_transition"));
}

#[test]
fn index_failure_after_store_write_is_detectable_and_repairable() {
    let fixture = Fixture::new();
    let index = FlakyIndex::default();
    let audit = Arc::new(issue_workflow_core::IssueMemoryAuditSink::new());
    let service = IssueService::new(
        fixture.store.clone(),
        index.clone(),
        fixture.gate.clone(),
        fixture.catalog.clone(),
        audit.clone(),
        IssueServiceConfig::default(),
    )
    .unwrap();
    fixture.store.insert(&[fixture.new_issue("ABCD")]).unwrap();
    service.index_all().unwrap();
    let key = IssueKey::new("ABCD");

    index.fail_writes(true);
    let err = service.set_severity(&fixture.principal, &key, Severity::Blocker).unwrap_err();

    assert_eq!(err.kind(), IssueErrorKind::IndexUnavailable);
    assert_eq!(fixture.store.select_by_key(&key).unwrap().unwrap().severity, Severity::Blocker);
    assert_eq!(service.get_by_key(&key).unwrap().severity, Severity::Major);
    let last = audit.events().pop().unwrap();
    assert_eq!(last.outcome, AuditOutcome::IndexDiverged);

    index.fail_writes(false);
    let repaired = service.reindex(&key).unwrap();
    assert_eq!(repaired.severity, Severity::Blocker);
    assert_eq!(repaired, IssueDoc::from(&fixture.store.select_by_key(&key).unwrap().unwrap()));
    let last = audit.events().pop().unwrap();
    assert_eq!(last.event, "reindex");
    assert_eq!(last.outcome, AuditOutcome::Applied);
}

#[test]
fn index_all_rebuilds_from_store() {
    let fixture = Fixture::new();
    fixture.store.insert(&[fixture.new_issue("A"), fixture.new_issue("B")]).unwrap();
    assert!(fixture.index.is_empty().unwrap());

    let count = fixture.service.index_all().unwrap();

    assert_eq!(count, 2);
    assert_eq!(fixture.index.len().unwrap(), 2);
}

#[test]
fn index_all_does_not_overwrite_concurrent_mutation() {
    let fixture = Fixture::new();
    let index = PausingIndex::default();
    let service = Arc::new(
        IssueService::new(
            fixture.store.clone(),
            index.clone(),
            fixture.gate.clone(),
            fixture.catalog.clone(),
            Arc::new(IssueNoopAuditSink),
            IssueServiceConfig::default(),
        )
        .unwrap(),
    );
    fixture.store.insert(&[fixture.new_issue("ABCD")]).unwrap();
    service.index_all().unwrap();
    let key = IssueKey::new("ABCD");

    let (paused, resume) = index.arm();
    let rebuild = {
        let service = Arc::clone(&service);
        thread::spawn(move || service.index_all())
    };
    paused.wait();
    let assigned = service.assign(&fixture.principal, &key, Some("perceval")).unwrap();
    resume.wait();
    let rebuilt = rebuild.join().unwrap().unwrap();

    assert_eq!(rebuilt, 1);
    assert_eq!(assigned.assignee, Some(Login::new("perceval")));
    let stored = fixture.store.select_by_key(&key).unwrap().unwrap();
    assert_eq!(stored.assignee, Some(Login::new("perceval")));
    assert_eq!(index.get_by_key(&key).unwrap().unwrap(), IssueDoc::from(&stored));
}

#[test]
fn index_all_drops_documents_missing_from_store() {
    let fixture = Fixture::new();
    let key = fixture.ingest_one("ABCD");
    let orphan = IssueDoc::from(&fixture.new_issue("ORPHAN"));
    fixture.index.index(orphan).unwrap();

    let count = fixture.service.index_all().unwrap();

    assert_eq!(count, 1);
    assert_eq!(fixture.index.keys().unwrap(), vec![key]);
}

#[test]
fn failed_changelog_write_leaves_store_and_index_agreeing() {
    let fixture = Fixture::new();
    let store = RejectingChangelogStore {
        inner: fixture.store.clone(),
        failing: Arc::new(AtomicBool::new(false)),
    };
    let audit = Arc::new(issue_workflow_core::IssueMemoryAuditSink::new());
    let service = IssueService::new(
        store.clone(),
        fixture.index.clone(),
        fixture.gate.clone(),
        fixture.catalog.clone(),
        audit.clone(),
        IssueServiceConfig::default(),
    )
    .unwrap();
    fixture.store.insert(&[fixture.new_issue("ABCD")]).unwrap();
    service.index_all().unwrap();
    let key = IssueKey::new("ABCD");
    let before = service.get_by_key(&key).unwrap();

    store.failing.store(true, Ordering::SeqCst);
    let err = service.set_severity(&fixture.principal, &key, Severity::Blocker).unwrap_err();

    assert_eq!(err.kind(), IssueErrorKind::StoreUnavailable);
    let stored = fixture.store.select_by_key(&key).unwrap().unwrap();
    assert_eq!(stored.severity, Severity::Major);
    assert_eq!(service.get_by_key(&key).unwrap(), before);
    assert_eq!(IssueDoc::from(&stored), before);
    assert!(fixture.store.select_changes(&key).unwrap().is_empty());
    assert_eq!(audit.events().pop().unwrap().outcome, AuditOutcome::Failed);
}

#[test]
fn reindex_of_unknown_issue_is_not_found() {
    let fixture = Fixture::new();
    let err = fixture.service.reindex(&IssueKey::new("missing")).unwrap_err();
    assert_eq!(err.kind(), IssueErrorKind::NotFound);
    assert_eq!(fixture.audit.events().pop().unwrap().outcome, AuditOutcome::Rejected);
}

#[test]
fn changelog_records_field_diffs_oldest_first() {
    let fixture = Fixture::new();
    let key = fixture.ingest_one("ABCD");

    fixture.service.assign(&fixture.principal, &key, Some("perceval")).unwrap();
    fixture.clock.advance(5);
    fixture.service.do_transition(&fixture.principal, &key, Transition::Resolve).unwrap();
    fixture.service.set_tags(&fixture.principal, &key, Vec::<Option<&str>>::new()).unwrap();

    let changes = fixture.service.changelog(&key).unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].diffs.len(), 1);
    assert_eq!(changes[0].diffs[0].field, "assignee");
    assert_eq!(changes[0].diffs[0].old_value, None);
    assert_eq!(changes[0].diffs[0].new_value.as_deref(), Some("perceval"));
    let fields: Vec<_> = changes[1].diffs.iter().map(|diff| diff.field.as_str()).collect();
    assert_eq!(fields, vec!["status", "resolution"]);
    assert!(changes[0].created_at < changes[1].created_at);
    assert_eq!(changes[1].user.as_str(), "gandalf");
}

#[test]
fn changelog_of_unknown_issue_is_not_found() {
    let fixture = Fixture::new();
    let err = fixture.service.changelog(&IssueKey::new("missing")).unwrap_err();
    assert_eq!(err.kind(), IssueErrorKind::NotFound);
}

#[test]
fn concurrent_mutations_of_one_issue_are_serialized() {
    let fixture = Fixture::new();
    let key = fixture.ingest_one("ABCD");
    let store = fixture.store.clone();
    let index = fixture.index.clone();
    let service = Arc::new(
        IssueService::new(
            store.clone(),
            index.clone(),
            fixture.gate.clone(),
            fixture.catalog.clone(),
            Arc::new(IssueNoopAuditSink),
            IssueServiceConfig::default(),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|round| {
            let service = Arc::clone(&service);
            let key = key.clone();
            let principal = fixture.principal.clone();
            thread::spawn(move || {
                for step in 0..20 {
                    let tag = format!("t{round}-{step}");
                    service.set_tags(&principal, &key, [Some(tag.as_str())]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stored = store.select_by_key(&key).unwrap().unwrap();
    assert_eq!(index.get_by_key(&key).unwrap().unwrap(), IssueDoc::from(&stored));
    assert_eq!(store.select_changes(&key).unwrap().len(), 160);
}

#[test]
fn read_after_write_returns_indexed_view() {
    let fixture = Fixture::new();
    let key = fixture.ingest_one("ABCD");

    let returned =
        fixture.service.do_transition(&fixture.principal, &key, Transition::WontFix).unwrap();

    assert_eq!(returned, fixture.service.get_by_key(&key).unwrap());
    assert_eq!(returned.status, IssueStatus::Resolved);
}
