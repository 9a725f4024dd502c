// crates/issue-workflow-config/tests/builders.rs
// ============================================================================
// Module: Config Builder Tests
// Description: Load config files and assemble runtime components from them.
// Purpose: Ensure a validated config wires a working issue service.
// Dependencies: issue-workflow-config, issue-workflow-core, tempfile
// ============================================================================

//! ## Overview
//! Writes TOML files to a temporary directory, loads them, and checks the
//! store, audit sink, permission gate, and service limits they produce.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::fs;
use std::path::Path;

use issue_workflow_config::ConfigError;
use issue_workflow_config::ConfiguredIssueStore;
use issue_workflow_config::IssueWorkflowConfig;
use issue_workflow_core::Component;
use issue_workflow_core::ComponentKey;
use issue_workflow_core::ComponentUuid;
use issue_workflow_core::InMemoryCatalog;
use issue_workflow_core::InMemoryIssueIndex;
use issue_workflow_core::Issue;
use issue_workflow_core::IssueKey;
use issue_workflow_core::IssueService;
use issue_workflow_core::IssueStore;
use issue_workflow_core::Principal;
use issue_workflow_core::ProjectKey;
use issue_workflow_core::ProjectRoleGate;
use issue_workflow_core::ProjectUuid;
use issue_workflow_core::Role;
use issue_workflow_core::RuleKey;
use issue_workflow_core::Severity;
use issue_workflow_store_sqlite::SqliteStoreMode;
use issue_workflow_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("issue-workflow.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn load_reads_every_section() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("data").join("issues.sqlite");
    let audit = temp.path().join("audit.jsonl");
    let body = format!(
        r#"
[store]
type = "sqlite"
path = "{db}"
journal_mode = "delete"
sync_mode = "normal"

[audit]
sink = "file"
path = "{audit}"

[search]
default_page_size = 20
max_page_size = 50

[issues]
max_tags_per_issue = 5

[[grants]]
project = "sample"
user = "gandalf"
roles = ["user", "issueadmin"]

[[grants]]
project = "sample"
group = "sonar-users"
roles = ["codeviewer"]
"#,
        db = db.display(),
        audit = audit.display(),
    );
    let path = write_config(temp.path(), &body);

    let config = IssueWorkflowConfig::load(Some(&path)).unwrap();

    let service = config.service_config();
    assert_eq!(service.default_page_size, 20);
    assert_eq!(service.max_page_size, 50);
    assert_eq!(service.max_tags_per_issue, 5);
    assert_eq!(service.max_message_length, 4_000);
    let sqlite = config.sqlite_store_config().unwrap();
    assert_eq!(sqlite.path, db);
    assert_eq!(sqlite.journal_mode, SqliteStoreMode::Delete);
    assert_eq!(sqlite.sync_mode, SqliteSyncMode::Normal);
    assert_eq!(config.role_grants().len(), 3);
}

#[test]
fn load_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = IssueWorkflowConfig::load(Some(&temp.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn load_rejects_oversized_file() {
    let temp = TempDir::new().unwrap();
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    let path = write_config(temp.path(), &padding);
    let err = IssueWorkflowConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("exceeds size limit"));
}

#[test]
fn load_rejects_non_utf8() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("issue-workflow.toml");
    fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
    let err = IssueWorkflowConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("utf-8"));
}

#[test]
fn load_reports_parse_errors() {
    let temp = TempDir::new().unwrap();
    let path = write_config(temp.path(), "[search\n");
    let err = IssueWorkflowConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_validates_after_parsing() {
    let temp = TempDir::new().unwrap();
    let path = write_config(temp.path(), "[store]\ntype = \"sqlite\"\n");
    let err = IssueWorkflowConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn permission_gate_is_seeded_from_grants() {
    let config = toml::from_str::<IssueWorkflowConfig>(
        "[[grants]]\nproject = \"sample\"\nuser = \"gandalf\"\nroles = [\"user\"]\n\n[[grants]]\n\
         project = \"sample\"\ngroup = \"viewers\"\nroles = [\"codeviewer\"]\n",
    )
    .unwrap();
    config.validate().unwrap();

    let gate = config.build_permission_gate();

    let sample = ProjectKey::new("sample");
    let gandalf = gate.roles_of(&Principal::new("gandalf"), &sample);
    let viewer = gate.roles_of(&Principal::new("bob").with_group("viewers"), &sample);
    assert_eq!(gandalf.into_iter().collect::<Vec<_>>(), vec![Role::User]);
    assert_eq!(viewer.into_iter().collect::<Vec<_>>(), vec![Role::CodeViewer]);
}

#[test]
fn file_audit_sink_appends_json_lines() {
    let temp = TempDir::new().unwrap();
    let audit = temp.path().join("audit.jsonl");
    let body = format!(
        "[audit]\nsink = \"file\"\npath = \"{}\"\n\n[[grants]]\nproject = \"sample\"\nuser = \
         \"gandalf\"\nroles = [\"user\"]\n",
        audit.display()
    );
    let config = IssueWorkflowConfig::load(Some(&write_config(temp.path(), &body))).unwrap();
    let service = assemble(&config);
    let key = seed(&service);

    service.set_severity(&Principal::new("gandalf"), &key, Severity::Blocker).unwrap();
    let _ = service.set_severity(&Principal::new("mallory"), &key, Severity::Info);

    let lines: Vec<serde_json::Value> = fs::read_to_string(&audit)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let outcomes: Vec<&str> = lines
        .iter()
        .filter(|line| line["event"] == "issue_mutation")
        .map(|line| line["outcome"].as_str().unwrap())
        .collect();
    assert_eq!(outcomes, vec!["applied", "denied"]);
}

#[test]
fn sqlite_backed_service_persists_mutations() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("issues.sqlite");
    let body = format!(
        "[store]\ntype = \"sqlite\"\npath = \"{}\"\n\n[audit]\nsink = \"none\"\n\n[[grants]]\n\
         project = \"sample\"\nuser = \"gandalf\"\nroles = [\"user\"]\n",
        db.display()
    );
    let config = IssueWorkflowConfig::load(Some(&write_config(temp.path(), &body))).unwrap();
    let key = {
        let service = assemble(&config);
        let key = seed(&service);
        service.set_tags(&Principal::new("gandalf"), &key, [Some("Security")]).unwrap();
        key
    };

    let reopened = config.build_store().unwrap();

    assert!(matches!(reopened, ConfiguredIssueStore::Sqlite(_)));
    let issue = reopened.select_by_key(&key).unwrap().unwrap();
    assert!(issue.tags.contains("security"));
    assert_eq!(reopened.select_changes(&key).unwrap().len(), 1);
}

type ConfiguredService =
    IssueService<ConfiguredIssueStore, InMemoryIssueIndex, ProjectRoleGate, InMemoryCatalog>;

fn assemble(config: &IssueWorkflowConfig) -> ConfiguredService {
    let catalog = InMemoryCatalog::new();
    let project = Component {
        key: ComponentKey::new("sample"),
        uuid: ComponentUuid::new("P1"),
        project_uuid: ProjectUuid::new("P1"),
    };
    catalog.add_component(project).unwrap();
    IssueService::new(
        config.build_store().unwrap(),
        InMemoryIssueIndex::new(),
        config.build_permission_gate(),
        catalog,
        config.build_audit_sink().unwrap(),
        config.service_config(),
    )
    .unwrap()
}

fn seed(service: &ConfiguredService) -> IssueKey {
    let project = Component {
        key: ComponentKey::new("sample"),
        uuid: ComponentUuid::new("P1"),
        project_uuid: ProjectUuid::new("P1"),
    };
    let issue = Issue::new(IssueKey::new("ABCD"), RuleKey::of("xoo", "x1"), &project);
    service.store().insert(&[issue]).unwrap();
    service.index_all().unwrap();
    IssueKey::new("ABCD")
}
