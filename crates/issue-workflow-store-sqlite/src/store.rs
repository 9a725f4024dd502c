// crates/issue-workflow-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Issue Store
// Description: Durable IssueStore backed by SQLite WAL.
// Purpose: Persist issue rows and their changelog with atomic writes.
// Dependencies: issue-workflow-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`IssueStore`] using `SQLite`. Each issue
//! is stored as a JSON payload next to the key and timestamp columns the
//! store owns. Every call runs in a single transaction, so a bulk insert
//! writes every row or none. Loads cross-check the payload against its
//! columns and fail closed on disagreement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use issue_workflow_core::Clock;
use issue_workflow_core::FieldDiff;
use issue_workflow_core::Issue;
use issue_workflow_core::IssueChange;
use issue_workflow_core::IssueKey;
use issue_workflow_core::IssueStore;
use issue_workflow_core::Login;
use issue_workflow_core::StoreError;
use issue_workflow_core::SystemClock;
use issue_workflow_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized size of one issue or changelog entry.
pub const MAX_ISSUE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` issue store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or payload/column mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Addressed issue does not exist.
    #[error("sqlite store unknown issue: {0}")]
    NotFound(String),
    /// Insert collided with an existing issue key.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "issue payload exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps an engine error into [`SqliteStoreError::Db`].
fn db_err(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed issue store with WAL support.
///
/// # Invariants
/// - The `created_at` and `updated_at` columns are authoritative and always
///   equal the values inside the stored payload.
#[derive(Clone)]
pub struct SqliteIssueStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Time source for row stamps.
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteIssueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIssueStore").finish_non_exhaustive()
    }
}

impl SqliteIssueStore {
    /// Opens an `SQLite`-backed issue store stamped by the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Opens an `SQLite`-backed issue store stamped by `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn with_clock(
        config: &SqliteStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            clock,
        })
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Inserts `issues` in one transaction.
    fn insert_rows(&self, issues: &[Issue]) -> Result<Vec<Issue>, SqliteStoreError> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        let mut seen = BTreeSet::new();
        let mut stored = Vec::with_capacity(issues.len());
        for issue in issues {
            if !seen.insert(&issue.key) || row_stamps(&tx, &issue.key)?.is_some() {
                return Err(SqliteStoreError::Conflict(format!(
                    "issue already exists: {}",
                    issue.key
                )));
            }
            let mut row = issue.clone();
            row.created_at = now;
            row.updated_at = now;
            let payload = encode(&row)?;
            tx.execute(
                "INSERT INTO issues (issue_key, created_at, updated_at, issue_json) VALUES (?1, \
                 ?2, ?3, ?4)",
                params![
                    row.key.as_str(),
                    row.created_at.as_unix_millis(),
                    row.updated_at.as_unix_millis(),
                    payload
                ],
            )
            .map_err(|err| db_err(&err))?;
            stored.push(row);
        }
        tx.commit().map_err(|err| db_err(&err))?;
        drop(guard);
        Ok(stored)
    }

    /// Replaces the mutable fields of an existing row, appending the
    /// recorded changelog entry in the same transaction.
    fn update_row(
        &self,
        issue: &Issue,
        recorded: Option<(&Login, Vec<FieldDiff>)>,
    ) -> Result<Issue, SqliteStoreError> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        let Some((created_at, previous_updated_at)) = row_stamps(&tx, &issue.key)? else {
            return Err(SqliteStoreError::NotFound(issue.key.to_string()));
        };
        let mut row = issue.clone();
        row.created_at = created_at;
        row.updated_at = previous_updated_at.next_after(now);
        let payload = encode(&row)?;
        tx.execute(
            "UPDATE issues SET updated_at = ?2, issue_json = ?3 WHERE issue_key = ?1",
            params![row.key.as_str(), row.updated_at.as_unix_millis(), payload],
        )
        .map_err(|err| db_err(&err))?;
        if let Some((user, diffs)) = recorded
            && !diffs.is_empty()
        {
            insert_change_row(
                &tx,
                &IssueChange {
                    issue_key: row.key.clone(),
                    user: user.clone(),
                    created_at: row.updated_at,
                    diffs,
                },
            )?;
        }
        tx.commit().map_err(|err| db_err(&err))?;
        drop(guard);
        Ok(row)
    }

    /// Loads one row by key.
    fn load_row(&self, key: &IssueKey) -> Result<Option<Issue>, SqliteStoreError> {
        let row = {
            let guard = self.lock()?;
            let row = guard
                .query_row(
                    "SELECT issue_key, created_at, updated_at, issue_json FROM issues WHERE \
                     issue_key = ?1",
                    params![key.as_str()],
                    read_columns,
                )
                .optional()
                .map_err(|err| db_err(&err))?;
            drop(guard);
            row
        };
        row.map(decode_issue).transpose()
    }

    /// Loads every row in key order.
    fn load_all(&self) -> Result<Vec<Issue>, SqliteStoreError> {
        let rows = {
            let guard = self.lock()?;
            let mut statement = guard
                .prepare(
                    "SELECT issue_key, created_at, updated_at, issue_json FROM issues ORDER BY \
                     issue_key",
                )
                .map_err(|err| db_err(&err))?;
            let rows = statement
                .query_map(params![], read_columns)
                .map_err(|err| db_err(&err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| db_err(&err))?;
            drop(statement);
            drop(guard);
            rows
        };
        rows.into_iter().map(decode_issue).collect()
    }

    /// Appends a changelog entry for an existing issue.
    fn append_change(&self, change: &IssueChange) -> Result<(), SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        if row_stamps(&tx, &change.issue_key)?.is_none() {
            return Err(SqliteStoreError::NotFound(change.issue_key.to_string()));
        }
        insert_change_row(&tx, change)?;
        tx.commit().map_err(|err| db_err(&err))?;
        drop(guard);
        Ok(())
    }

    /// Loads the changelog of `key`, oldest first.
    fn load_changes(&self, key: &IssueKey) -> Result<Vec<IssueChange>, SqliteStoreError> {
        let payloads: Vec<Vec<u8>> = {
            let guard = self.lock()?;
            let mut statement = guard
                .prepare(
                    "SELECT change_json FROM issue_changes WHERE issue_key = ?1 ORDER BY change_id",
                )
                .map_err(|err| db_err(&err))?;
            let payloads = statement
                .query_map(params![key.as_str()], |row| row.get(0))
                .map_err(|err| db_err(&err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| db_err(&err))?;
            drop(statement);
            drop(guard);
            payloads
        };
        payloads
            .into_iter()
            .map(|bytes| {
                check_size(bytes.len())?;
                let change: IssueChange = serde_json::from_slice(&bytes)
                    .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
                if &change.issue_key != key {
                    return Err(SqliteStoreError::Corrupt(format!(
                        "changelog entry filed under {key} belongs to {}",
                        change.issue_key
                    )));
                }
                Ok(change)
            })
            .collect()
    }
}

impl IssueStore for SqliteIssueStore {
    fn insert(&self, issues: &[Issue]) -> Result<Vec<Issue>, StoreError> {
        self.insert_rows(issues).map_err(StoreError::from)
    }

    fn select_by_key(&self, key: &IssueKey) -> Result<Option<Issue>, StoreError> {
        self.load_row(key).map_err(StoreError::from)
    }

    fn select_all(&self) -> Result<Vec<Issue>, StoreError> {
        self.load_all().map_err(StoreError::from)
    }

    fn update(&self, issue: &Issue) -> Result<Issue, StoreError> {
        self.update_row(issue, None).map_err(StoreError::from)
    }

    fn update_with_change(
        &self,
        issue: &Issue,
        user: &Login,
        diffs: Vec<FieldDiff>,
    ) -> Result<Issue, StoreError> {
        self.update_row(issue, Some((user, diffs))).map_err(StoreError::from)
    }

    fn insert_change(&self, change: &IssueChange) -> Result<(), StoreError> {
        self.append_change(change).map_err(StoreError::from)
    }

    fn select_changes(&self, key: &IssueKey) -> Result<Vec<IssueChange>, StoreError> {
        self.load_changes(key).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Codec
// ============================================================================

/// Raw issue columns: key, created, updated, payload.
type IssueColumns = (String, i64, i64, Vec<u8>);

/// Reads the issue columns from a result row.
fn read_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<IssueColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Appends one changelog row inside `tx`.
fn insert_change_row(tx: &Transaction<'_>, change: &IssueChange) -> Result<(), SqliteStoreError> {
    let payload = encode(change)?;
    tx.execute(
        "INSERT INTO issue_changes (issue_key, created_at, change_json) VALUES (?1, ?2, ?3)",
        params![change.issue_key.as_str(), change.created_at.as_unix_millis(), payload],
    )
    .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Returns the stored `(created_at, updated_at)` of `key`, if present.
fn row_stamps(
    tx: &Transaction<'_>,
    key: &IssueKey,
) -> Result<Option<(Timestamp, Timestamp)>, SqliteStoreError> {
    let stamps: Option<(i64, i64)> = tx
        .query_row(
            "SELECT created_at, updated_at FROM issues WHERE issue_key = ?1",
            params![key.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|err| db_err(&err))?;
    Ok(stamps.map(|(created, updated)| {
        (Timestamp::from_unix_millis(created), Timestamp::from_unix_millis(updated))
    }))
}

/// Serializes a payload and enforces the size limit.
fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, SqliteStoreError> {
    let bytes =
        serde_json::to_vec(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    check_size(bytes.len())?;
    Ok(bytes)
}

/// Rejects payloads over [`MAX_ISSUE_BYTES`].
const fn check_size(actual_bytes: usize) -> Result<(), SqliteStoreError> {
    if actual_bytes > MAX_ISSUE_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_ISSUE_BYTES,
            actual_bytes,
        });
    }
    Ok(())
}

/// Decodes a row and cross-checks the payload against its columns.
fn decode_issue(columns: IssueColumns) -> Result<Issue, SqliteStoreError> {
    let (key, created_at, updated_at, bytes) = columns;
    check_size(bytes.len())?;
    let issue: Issue =
        serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if issue.key.as_str() != key {
        return Err(SqliteStoreError::Invalid(
            "issue_key mismatch between column and payload".to_string(),
        ));
    }
    if issue.created_at.as_unix_millis() != created_at
        || issue.updated_at.as_unix_millis() != updated_at
    {
        return Err(SqliteStoreError::Corrupt(format!("timestamp mismatch for issue {key}")));
    }
    Ok(issue)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteStoreError::Invalid("store path is empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_err(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_err(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_err(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_err(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_err(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS issues (
                    issue_key TEXT PRIMARY KEY,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    issue_json BLOB NOT NULL
                );
                CREATE TABLE IF NOT EXISTS issue_changes (
                    change_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    issue_key TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    change_json BLOB NOT NULL,
                    FOREIGN KEY (issue_key) REFERENCES issues(issue_key) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_issue_changes_issue_key
                    ON issue_changes (issue_key);",
            )
            .map_err(|err| db_err(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_err(&err))?;
    Ok(())
}
