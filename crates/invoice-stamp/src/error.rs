//! Error types for invoice stamping.

use invoice_stamp_core::CoreError;
use invoice_stamp_ledger::LedgerError;
use thiserror::Error;

/// What a caller should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The document or an encoded value is wrong. Fix the data.
    BadInput,
    /// Key or certificate material is wrong. Fix the key setup.
    BadKey,
    /// The configuration is inconsistent. Fix the configuration.
    Config,
    /// The signing primitive failed.
    Signing,
    /// The ledger was busy. Retry later.
    Transient,
    /// The ledger backend failed.
    Storage,
}

/// Errors that can occur while stamping or verifying.
#[derive(Debug, Error)]
pub enum StampError {
    /// The document could not be read, or a required field is missing.
    #[error("malformed document ({context}): {reason}")]
    MalformedDocument { context: String, reason: String },

    /// Key or certificate material could not be loaded or parsed.
    #[error("key material error: {0}")]
    KeyMaterial(String),

    /// The signing primitive rejected its input.
    #[error("signing error: {0}")]
    Signing(String),

    /// A TLV payload ended inside a field.
    #[error("truncated payload at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedPayload {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// Text that should have been base64 or hex was not.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The ledger stayed contended for every allowed attempt.
    #[error("ledger contention for entity {entity} after {attempts} attempt(s)")]
    Contention { entity: String, attempts: u32 },

    /// Ledger backend failure.
    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    /// Inconsistent configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A result could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StampError {
    /// Shorthand for a [`StampError::MalformedDocument`].
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        StampError::MalformedDocument {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StampError::MalformedDocument { .. }
            | StampError::TruncatedPayload { .. }
            | StampError::InvalidEncoding(_)
            | StampError::Serialization(_) => ErrorKind::BadInput,
            StampError::KeyMaterial(_) => ErrorKind::BadKey,
            StampError::Config(_) => ErrorKind::Config,
            StampError::Signing(_) => ErrorKind::Signing,
            StampError::Contention { .. } => ErrorKind::Transient,
            StampError::Ledger(_) => ErrorKind::Storage,
        }
    }

    /// True if the same call may succeed later without any change.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<CoreError> for StampError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedDocument { context, reason } => {
                StampError::MalformedDocument { context, reason }
            }
            CoreError::KeyMaterial(msg) => StampError::KeyMaterial(msg),
            CoreError::Signing(msg) => StampError::Signing(msg),
            CoreError::TruncatedPayload {
                offset,
                needed,
                remaining,
            } => StampError::TruncatedPayload {
                offset,
                needed,
                remaining,
            },
            CoreError::InvalidEncoding(msg) => StampError::InvalidEncoding(msg),
        }
    }
}

impl From<LedgerError> for StampError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict { entity, .. } | LedgerError::Timeout { entity, .. } => {
                StampError::Contention {
                    entity,
                    attempts: 1,
                }
            }
            other => StampError::Ledger(other),
        }
    }
}

impl From<serde_json::Error> for StampError {
    fn from(err: serde_json::Error) -> Self {
        StampError::Serialization(err.to_string())
    }
}

/// Result type for stamping operations.
pub type Result<T> = std::result::Result<T, StampError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_kinds() {
        let bad_doc: StampError = CoreError::malformed("parse", "unclosed element").into();
        assert_eq!(bad_doc.kind(), ErrorKind::BadInput);

        let bad_key: StampError = CoreError::KeyMaterial("no key".into()).into();
        assert_eq!(bad_key.kind(), ErrorKind::BadKey);

        let signing: StampError = CoreError::Signing("rejected".into()).into();
        assert_eq!(signing.kind(), ErrorKind::Signing);
        assert!(!signing.is_transient());
    }

    #[test]
    fn test_ledger_conflict_is_transient() {
        let err: StampError = LedgerError::Conflict {
            entity: "e".into(),
            expected: 1,
            found: 2,
        }
        .into();
        assert!(err.is_transient());

        let err: StampError = LedgerError::InvalidData("bad row".into()).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
