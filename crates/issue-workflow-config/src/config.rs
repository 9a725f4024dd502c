// crates/issue-workflow-config/src/config.rs
// ============================================================================
// Module: Issue Workflow Configuration
// Description: Configuration loading and validation for the issue service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: issue-workflow-core, issue-workflow-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Builders turn a validated
//! config into the runtime pieces the [`IssueService`] is assembled from.
//!
//! [`IssueService`]: issue_workflow_core::IssueService

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use issue_workflow_core::FieldDiff;
use issue_workflow_core::GrantSubject;
use issue_workflow_core::InMemoryIssueStore;
use issue_workflow_core::Issue;
use issue_workflow_core::IssueAuditSink;
use issue_workflow_core::IssueChange;
use issue_workflow_core::IssueFileAuditSink;
use issue_workflow_core::IssueKey;
use issue_workflow_core::IssueNoopAuditSink;
use issue_workflow_core::IssueServiceConfig;
use issue_workflow_core::IssueStderrAuditSink;
use issue_workflow_core::IssueStore;
use issue_workflow_core::Login;
use issue_workflow_core::ProjectKey;
use issue_workflow_core::ProjectRoleGate;
use issue_workflow_core::Role;
use issue_workflow_core::RoleGrant;
use issue_workflow_core::StoreError;
use issue_workflow_store_sqlite::SqliteIssueStore;
use issue_workflow_store_sqlite::SqliteStoreConfig;
use issue_workflow_store_sqlite::SqliteStoreMode;
use issue_workflow_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "issue-workflow.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "ISSUE_WORKFLOW_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default `SQLite` busy timeout in milliseconds.
pub(crate) const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum number of role grants.
pub(crate) const MAX_GRANTS: usize = 1_024;
/// Maximum length of a grant project key, login, or group name.
pub(crate) const MAX_GRANT_NAME_LENGTH: usize = 256;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Issue workflow configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueWorkflowConfig {
    /// Issue store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Search paging configuration.
    #[serde(default)]
    pub search: SearchConfig,
    /// Issue field limits.
    #[serde(default)]
    pub issues: IssueLimitsConfig,
    /// Project role grants seeding the permission gate.
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
}

impl IssueWorkflowConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.audit.validate()?;
        self.service_config()
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("search/issues: {err}")))?;
        if self.grants.len() > MAX_GRANTS {
            return Err(ConfigError::Invalid(format!("too many grants (max {MAX_GRANTS})")));
        }
        for (index, grant) in self.grants.iter().enumerate() {
            grant.validate(index)?;
        }
        Ok(())
    }

    /// Returns the service limits described by `[search]` and `[issues]`.
    #[must_use]
    pub const fn service_config(&self) -> IssueServiceConfig {
        IssueServiceConfig {
            default_page_size: self.search.default_page_size,
            max_page_size: self.search.max_page_size,
            max_tags_per_issue: self.issues.max_tags_per_issue,
            max_message_length: self.issues.max_message_length,
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_audit_sink(&self) -> Result<Arc<dyn IssueAuditSink>, ConfigError> {
        match self.audit.sink {
            AuditSinkType::Stderr => Ok(Arc::new(IssueStderrAuditSink)),
            AuditSinkType::Disabled => Ok(Arc::new(IssueNoopAuditSink)),
            AuditSinkType::File => {
                let path = self.audit.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("file audit sink requires path".to_string())
                })?;
                let sink = IssueFileAuditSink::new(path)
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Builds a permission gate seeded with every configured grant.
    #[must_use]
    pub fn build_permission_gate(&self) -> ProjectRoleGate {
        let gate = ProjectRoleGate::new();
        for grant in self.role_grants() {
            gate.grant(grant);
        }
        gate
    }

    /// Expands `[[grants]]` entries into one grant per role.
    #[must_use]
    pub fn role_grants(&self) -> Vec<RoleGrant> {
        self.grants
            .iter()
            .flat_map(|grant| {
                let subject = grant.subject();
                grant.roles.iter().filter_map(move |role| {
                    subject.clone().map(|subject| RoleGrant {
                        project: ProjectKey::new(grant.project.trim()),
                        subject,
                        role: *role,
                    })
                })
            })
            .collect()
    }

    /// Returns the `SQLite` store config when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_store_config(&self) -> Option<SqliteStoreConfig> {
        match self.store.store_type {
            StoreType::Memory => None,
            StoreType::Sqlite => self.store.path.as_ref().map(|path| SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.store.busy_timeout_ms,
                journal_mode: self.store.journal_mode,
                sync_mode: self.store.sync_mode,
            }),
        }
    }

    /// Opens the configured issue store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the sqlite store cannot be opened.
    pub fn build_store(&self) -> Result<ConfiguredIssueStore, ConfigError> {
        match self.sqlite_store_config() {
            None if self.store.store_type == StoreType::Memory => {
                Ok(ConfiguredIssueStore::Memory(InMemoryIssueStore::new()))
            }
            None => Err(ConfigError::Invalid("sqlite store requires path".to_string())),
            Some(config) => SqliteIssueStore::new(&config)
                .map(ConfiguredIssueStore::Sqlite)
                .map_err(|err| ConfigError::Io(err.to_string())),
        }
    }
}

/// Issue store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates issue store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "store busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Issue store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Audit log path (JSON lines) for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (AuditSinkType::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

/// Audit sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// Append-only JSON lines file.
    File,
    /// Discard audit events.
    #[serde(rename = "none")]
    Disabled,
}

/// Search paging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Hits per page when a request names no limit.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Upper bound on any requested limit.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Issue field limits.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueLimitsConfig {
    /// Maximum tags per issue after normalization.
    #[serde(default = "default_max_tags_per_issue")]
    pub max_tags_per_issue: usize,
    /// Maximum manual issue message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for IssueLimitsConfig {
    fn default() -> Self {
        Self {
            max_tags_per_issue: default_max_tags_per_issue(),
            max_message_length: default_max_message_length(),
        }
    }
}

/// One `[[grants]]` entry.
///
/// # Invariants
/// - Exactly one of `user` and `group` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantConfig {
    /// Project key the roles apply to.
    pub project: String,
    /// Login receiving the roles.
    #[serde(default)]
    pub user: Option<String>,
    /// Group receiving the roles.
    #[serde(default)]
    pub group: Option<String>,
    /// Granted roles.
    pub roles: Vec<Role>,
}

impl GrantConfig {
    /// Returns the grant subject, if exactly one is set.
    fn subject(&self) -> Option<GrantSubject> {
        match (&self.user, &self.group) {
            (Some(user), None) => Some(GrantSubject::User(Login::new(user.trim()))),
            (None, Some(group)) => Some(GrantSubject::Group(group.trim().to_string())),
            _ => None,
        }
    }

    /// Validates one grant entry.
    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let field = format!("grants[{index}]");
        validate_name(&format!("{field}.project"), &self.project)?;
        match (&self.user, &self.group) {
            (Some(user), None) => validate_name(&format!("{field}.user"), user)?,
            (None, Some(group)) => validate_name(&format!("{field}.group"), group)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "{field} must set exactly one of user or group"
                )));
            }
        }
        if self.roles.is_empty() {
            return Err(ConfigError::Invalid(format!("{field}.roles must be non-empty")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Configured Store
// ============================================================================

/// Issue store selected by `[store]`.
#[derive(Debug, Clone)]
pub enum ConfiguredIssueStore {
    /// In-memory rows.
    Memory(InMemoryIssueStore),
    /// Durable `SQLite` rows.
    Sqlite(SqliteIssueStore),
}

impl IssueStore for ConfiguredIssueStore {
    fn insert(&self, issues: &[Issue]) -> Result<Vec<Issue>, StoreError> {
        match self {
            Self::Memory(store) => store.insert(issues),
            Self::Sqlite(store) => store.insert(issues),
        }
    }

    fn select_by_key(&self, key: &IssueKey) -> Result<Option<Issue>, StoreError> {
        match self {
            Self::Memory(store) => store.select_by_key(key),
            Self::Sqlite(store) => store.select_by_key(key),
        }
    }

    fn select_all(&self) -> Result<Vec<Issue>, StoreError> {
        match self {
            Self::Memory(store) => store.select_all(),
            Self::Sqlite(store) => store.select_all(),
        }
    }

    fn update(&self, issue: &Issue) -> Result<Issue, StoreError> {
        match self {
            Self::Memory(store) => store.update(issue),
            Self::Sqlite(store) => store.update(issue),
        }
    }

    fn update_with_change(
        &self,
        issue: &Issue,
        user: &Login,
        diffs: Vec<FieldDiff>,
    ) -> Result<Issue, StoreError> {
        match self {
            Self::Memory(store) => store.update_with_change(issue, user, diffs),
            Self::Sqlite(store) => store.update_with_change(issue, user, diffs),
        }
    }

    fn insert_change(&self, change: &IssueChange) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.insert_change(change),
            Self::Sqlite(store) => store.insert_change(change),
        }
    }

    fn select_changes(&self, key: &IssueKey) -> Result<Vec<IssueChange>, StoreError> {
        match self {
            Self::Memory(store) => store.select_changes(key),
            Self::Sqlite(store) => store.select_changes(key),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a grant name (project key, login, or group).
fn validate_name(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_GRANT_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Default hits per page.
fn default_page_size() -> usize {
    IssueServiceConfig::default().default_page_size
}

/// Default upper bound on page size.
fn default_max_page_size() -> usize {
    IssueServiceConfig::default().max_page_size
}

/// Default tag limit.
fn default_max_tags_per_issue() -> usize {
    IssueServiceConfig::default().max_tags_per_issue
}

/// Default manual message length limit.
fn default_max_message_length() -> usize {
    IssueServiceConfig::default().max_message_length
}

// ============================================================================
// SECTION: Tests
// ============================================================================
