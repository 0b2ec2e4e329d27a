//! Error types for the invoice stamp core.

use thiserror::Error;

/// Core errors that can occur while parsing, canonicalizing, signing, or
/// decoding.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The document could not be parsed, serialized, or read.
    #[error("malformed document ({context}): {reason}")]
    MalformedDocument { context: String, reason: String },

    /// Key or certificate bytes are missing, unreadable, or unsupported.
    #[error("key material error: {0}")]
    KeyMaterial(String),

    /// The signing primitive rejected its input.
    #[error("signing error: {0}")]
    Signing(String),

    /// A TLV buffer ended inside a field.
    #[error("truncated payload at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedPayload {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// Text that should have been base64 or hex was not.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::MalformedDocument`].
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::MalformedDocument {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
