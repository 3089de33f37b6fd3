//! Error types for ingestion, storage and the summary engine.

use std::fmt;

use thiserror::Error;

/// Malformed input rejected during ingestion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("check {check_id} does not exist")]
    UnknownCheck { check_id: i64 },

    #[error("check {check_id} has unknown status '{status}'")]
    UnknownStatus { check_id: i64, status: String },

    #[error("result for check {check_id} belongs to audit '{found}', expected '{expected}'")]
    AuditMismatch {
        check_id: i64,
        expected: String,
        found: String,
    },
}

/// Errors from the persistence collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A previous holder of the connection panicked.
    #[error("Database lock poisoned")]
    Poisoned,

    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad data already in storage (e.g. an unparsable timestamp).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Malformed input at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Engine stage that touched storage when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Commit,
    Transition,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Load => "load",
            Stage::Commit => "commit",
            Stage::Transition => "transition",
        })
    }
}

/// Failures surfaced to the caller of the summary engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audit '{audit_id}' not found")]
    AuditNotFound { audit_id: String },

    #[error("invalid input for audit '{audit_id}': {source}")]
    InvalidInput {
        audit_id: String,
        #[source]
        source: IngestError,
    },

    #[error("summary generation failed for audit '{audit_id}' during {stage}: {source}")]
    Store {
        audit_id: String,
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    pub fn audit_id(&self) -> &str {
        match self {
            EngineError::AuditNotFound { audit_id }
            | EngineError::InvalidInput { audit_id, .. }
            | EngineError::Store { audit_id, .. } => audit_id,
        }
    }

    /// True for the 404-class failures; everything else is a generation failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::AuditNotFound { .. })
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            EngineError::Store { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
