// crates/issue-workflow-core/tests/common/mod.rs
// =============================================================================
// Module: Issue Workflow Test Helpers
// Description: Shared fixture wiring an Issue Service to in-memory collaborators.
// Purpose: Reduce duplication across integration tests for issue-workflow-core.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(clippy::unwrap_used, reason = "Fixture setup uses deterministic data.")]

use std::sync::Arc;

use issue_workflow_core::ActionPlan;
use issue_workflow_core::ActionPlanKey;
use issue_workflow_core::Component;
use issue_workflow_core::ComponentKey;
use issue_workflow_core::ComponentUuid;
use issue_workflow_core::InMemoryCatalog;
use issue_workflow_core::InMemoryIssueIndex;
use issue_workflow_core::InMemoryIssueStore;
use issue_workflow_core::Issue;
use issue_workflow_core::IssueKey;
use issue_workflow_core::IssueMemoryAuditSink;
use issue_workflow_core::IssueService;
use issue_workflow_core::IssueServiceConfig;
use issue_workflow_core::IssueStore;
use issue_workflow_core::Login;
use issue_workflow_core::ManualClock;
use issue_workflow_core::Principal;
use issue_workflow_core::ProjectRoleGate;
use issue_workflow_core::ProjectUuid;
use issue_workflow_core::Role;
use issue_workflow_core::Rule;
use issue_workflow_core::RuleKey;
use issue_workflow_core::Timestamp;
use issue_workflow_core::User;

/// Service wired to in-memory collaborators.
pub type TestService =
    IssueService<InMemoryIssueStore, InMemoryIssueIndex, ProjectRoleGate, InMemoryCatalog>;

/// Project key used by every fixture.
pub const PROJECT_KEY: &str = "sample";
/// Action plan registered in the catalog.
pub const ACTION_PLAN_KEY: &str = "EFGH";

/// Test fixture mirroring a project with one file, one analyzer rule, and one
/// manual rule.
pub struct Fixture {
    /// Service under test.
    pub service: TestService,
    /// Shared store handle.
    pub store: InMemoryIssueStore,
    /// Shared index handle.
    pub index: InMemoryIssueIndex,
    /// Shared catalog handle.
    pub catalog: InMemoryCatalog,
    /// Shared gate handle.
    pub gate: ProjectRoleGate,
    /// Captured audit events.
    pub audit: Arc<IssueMemoryAuditSink>,
    /// Store clock.
    pub clock: ManualClock,
    /// Root project component.
    pub project: Component,
    /// File component inside the project.
    pub file: Component,
    /// Analyzer rule (`xoo:x1`).
    pub rule: Rule,
    /// Manual rule.
    pub manual_rule: Rule,
    /// Connected principal holding USER on the project.
    pub principal: Principal,
}

impl Fixture {
    /// Builds the fixture with default service limits.
    pub fn new() -> Self {
        Self::with_config(IssueServiceConfig::default())
    }

    /// Builds the fixture with explicit service limits.
    pub fn with_config(config: IssueServiceConfig) -> Self {
        let clock = ManualClock::new(Timestamp::from_unix_millis(1_000));
        let store = InMemoryIssueStore::with_clock(Arc::new(clock.clone()));
        let index = InMemoryIssueIndex::new();
        let catalog = InMemoryCatalog::new();
        let gate = ProjectRoleGate::new();
        let audit = Arc::new(IssueMemoryAuditSink::new());

        let project = Component {
            key: ComponentKey::new(PROJECT_KEY),
            uuid: ComponentUuid::new("P1"),
            project_uuid: ProjectUuid::new("P1"),
        };
        let file = Component {
            key: ComponentKey::new("sample:src/main/xoo/Sample.xoo"),
            uuid: ComponentUuid::new("F1"),
            project_uuid: ProjectUuid::new("P1"),
        };
        let rule = Rule {
            key: RuleKey::of("xoo", "x1"),
            name: "Rule x1".to_string(),
            manual: false,
        };
        let manual_rule = Rule {
            key: RuleKey::of("manual", "manualRuleKey"),
            name: "Manual rule name".to_string(),
            manual: true,
        };
        catalog.add_component(project.clone()).unwrap();
        catalog.add_component(file.clone()).unwrap();
        catalog.add_rule(rule.clone()).unwrap();
        catalog.add_rule(manual_rule.clone()).unwrap();
        for (login, name) in [("gandalf", "Gandalf"), ("perceval", "Perceval")] {
            catalog
                .add_user(User {
                    login: Login::new(login),
                    name: name.to_string(),
                })
                .unwrap();
        }
        catalog
            .add_action_plan(ActionPlan {
                key: ActionPlanKey::new(ACTION_PLAN_KEY),
                project_uuid: project.project_uuid.clone(),
            })
            .unwrap();
        assert!(gate.grant_user(PROJECT_KEY, "gandalf", Role::User));

        let service = IssueService::new(
            store.clone(),
            index.clone(),
            gate.clone(),
            catalog.clone(),
            audit.clone(),
            config,
        )
        .unwrap();

        Self {
            service,
            store,
            index,
            catalog,
            gate,
            audit,
            clock,
            project,
            file,
            rule,
            manual_rule,
            principal: Principal::new("gandalf"),
        }
    }

    /// Builds an open analyzer issue on the fixture file.
    pub fn new_issue(&self, key: &str) -> Issue {
        Issue::new(IssueKey::new(key), self.rule.key.clone(), &self.file)
    }

    /// Inserts issues into the store and rebuilds the index, like an ingestion run.
    pub fn ingest(&self, issues: &[Issue]) {
        self.store.insert(issues).unwrap();
        self.service.index_all().unwrap();
    }

    /// Inserts and indexes a single open issue with the given key.
    pub fn ingest_one(&self, key: &str) -> IssueKey {
        self.ingest(&[self.new_issue(key)]);
        IssueKey::new(key)
    }
}
