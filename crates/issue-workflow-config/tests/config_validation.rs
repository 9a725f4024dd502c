//! Config validation tests for issue-workflow-config.
// crates/issue-workflow-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate store, audit, limits, and grant constraints.
// Purpose: Ensure configuration fails closed on every inconsistent section.
// =============================================================================

use std::path::PathBuf;

use issue_workflow_config::AuditSinkType;
use issue_workflow_config::GrantConfig;
use issue_workflow_config::StoreType;
use issue_workflow_core::Role;

mod common;

type TestResult = Result<(), String>;

#[test]
fn empty_config_is_valid_with_defaults() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let service = config.service_config();
    if service.default_page_size != 100 || service.max_page_size != 500 {
        return Err(format!(
            "unexpected paging defaults: {} / {}",
            service.default_page_size, service.max_page_size
        ));
    }
    if config.store.store_type != StoreType::Memory || config.audit.sink != AuditSinkType::Stderr {
        return Err("unexpected backend defaults".to_string());
    }
    Ok(())
}

#[test]
fn memory_store_rejects_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.path = Some(PathBuf::from("issues.db"));
    common::assert_invalid(config.validate(), "memory store must not set path")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    common::assert_invalid(config.validate(), "sqlite store requires path")
}

#[test]
fn sqlite_store_rejects_zero_busy_timeout() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    config.store.path = Some(PathBuf::from("issues.db"));
    config.store.busy_timeout_ms = 0;
    common::assert_invalid(config.validate(), "busy_timeout_ms must be greater than zero")
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    let config =
        common::config_from_toml("[audit]\nsink = \"file\"\n").map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "file audit sink requires path")
}

#[test]
fn audit_path_without_file_sink_is_rejected() -> TestResult {
    let config = common::config_from_toml("[audit]\nsink = \"none\"\npath = \"audit.jsonl\"\n")
        .map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "audit.path is only valid for the file sink")
}

#[test]
fn default_page_size_above_max_is_rejected() -> TestResult {
    let config =
        common::config_from_toml("[search]\ndefault_page_size = 600\nmax_page_size = 500\n")
            .map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "exceeds max page size")
}

#[test]
fn zero_message_length_is_rejected() -> TestResult {
    let config = common::config_from_toml("[issues]\nmax_message_length = 0\n")
        .map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "max message length must be greater than zero")
}

#[test]
fn grant_requires_exactly_one_subject() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.grants.push(GrantConfig {
        project: "sample".to_string(),
        user: None,
        group: None,
        roles: vec![Role::User],
    });
    common::assert_invalid(config.validate(), "grants[0] must set exactly one of user or group")
}

#[test]
fn grant_requires_roles() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.grants.push(GrantConfig {
        project: "sample".to_string(),
        user: Some("gandalf".to_string()),
        group: None,
        roles: Vec::new(),
    });
    common::assert_invalid(config.validate(), "grants[0].roles must be non-empty")
}

#[test]
fn grant_rejects_blank_project() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.grants.push(GrantConfig {
        project: "  ".to_string(),
        user: Some("gandalf".to_string()),
        group: None,
        roles: vec![Role::User],
    });
    common::assert_invalid(config.validate(), "grants[0].project must be non-empty")
}

#[test]
fn unknown_role_fails_to_parse() -> TestResult {
    let parsed = common::config_from_toml(
        "[[grants]]\nproject = \"sample\"\nuser = \"gandalf\"\nroles = [\"wizard\"]\n",
    );
    if parsed.is_ok() {
        return Err("unknown role should not parse".to_string());
    }
    Ok(())
}
