//! Error types for the ledger module.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The chain moved on between reserve and commit.
    ///
    /// `expected` is the counter the reservation was based on, `found` the
    /// counter now stored (0 when the entity has no record).
    #[error("chain conflict for entity {entity}: reserved on counter {expected}, found {found}")]
    Conflict {
        entity: String,
        expected: u64,
        found: u64,
    },

    /// The entity stayed locked for longer than the caller was willing to wait.
    #[error("timed out after {waited_ms}ms waiting for entity {entity}")]
    Timeout { entity: String, waited_ms: u64 },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// True for failures that a fresh reservation may resolve.
    pub fn is_contention(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. } | LedgerError::Timeout { .. })
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
