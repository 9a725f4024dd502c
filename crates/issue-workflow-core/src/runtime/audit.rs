// crates/issue-workflow-core/src/runtime/audit.rs
// ============================================================================
// Module: Issue Audit Logging
// Description: Structured audit events for issue mutations and re-indexing.
// Purpose: Emit one JSON line per mutating call without hard logging deps.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every mutating Issue Service call records exactly one
//! [`IssueAuditEvent`]. Sinks serialize events as JSON lines so deployments
//! can route them to their own pipeline. The `index_diverged` outcome marks
//! a store write whose index write failed; re-indexing that key repairs it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome classification of an audited call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Store and index were both updated.
    Applied,
    /// Permission gate refused the call.
    Denied,
    /// Input or workflow validation rejected the call.
    Rejected,
    /// A collaborator failed before the store was written.
    Failed,
    /// Store write succeeded but the index write failed.
    IndexDiverged,
}

/// Issue audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation label.
    pub operation: &'static str,
    /// Addressed issue key when known.
    pub issue_key: Option<String>,
    /// Acting principal login when known.
    pub principal: Option<String>,
    /// Resolved project key when known.
    pub project_key: Option<String>,
    /// Call outcome.
    pub outcome: AuditOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

/// Inputs required to construct an audit event.
pub struct IssueAuditEventParams {
    /// Operation label.
    pub operation: &'static str,
    /// Addressed issue key when known.
    pub issue_key: Option<String>,
    /// Acting principal login when known.
    pub principal: Option<String>,
    /// Resolved project key when known.
    pub project_key: Option<String>,
    /// Call outcome.
    pub outcome: AuditOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

impl IssueAuditEvent {
    /// Creates a mutation audit event with a consistent timestamp.
    #[must_use]
    pub fn mutation(params: IssueAuditEventParams) -> Self {
        Self::with_event("issue_mutation", params)
    }

    /// Creates a re-index audit event with a consistent timestamp.
    #[must_use]
    pub fn reindex(params: IssueAuditEventParams) -> Self {
        Self::with_event("reindex", params)
    }

    /// Builds the event payload.
    fn with_event(event: &'static str, params: IssueAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            operation: params.operation,
            issue_key: params.issue_key,
            principal: params.principal,
            project_key: params.project_key,
            outcome: params.outcome,
            error_kind: params.error_kind,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for issue events.
pub trait IssueAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &IssueAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct IssueStderrAuditSink;

impl IssueAuditSink for IssueStderrAuditSink {
    fn record(&self, event: &IssueAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct IssueFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl IssueFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl IssueAuditSink for IssueFileAuditSink {
    fn record(&self, event: &IssueAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct IssueNoopAuditSink;

impl IssueAuditSink for IssueNoopAuditSink {
    fn record(&self, _event: &IssueAuditEvent) {}
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct IssueMemoryAuditSink {
    /// Captured events, oldest first.
    events: Mutex<Vec<IssueAuditEvent>>,
}

impl IssueMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the captured events.
    #[must_use]
    pub fn events(&self) -> Vec<IssueAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl IssueAuditSink for IssueMemoryAuditSink {
    fn record(&self, event: &IssueAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
