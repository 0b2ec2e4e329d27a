//! Strong type definitions for invoice stamping.
//!
//! Identifiers and hashes are newtypes so an entity id can never be passed
//! where a digest is expected.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

use crate::error::{CoreError, Result};

/// Hex form of the digest that stands in for "no previous document".
///
/// This is SHA-256 of the single byte `"0"`.
pub const PLACEHOLDER_DIGEST_HEX: &str =
    "5feceb66ffc86f38d952786c6d696c79c2dbc239dd4e91b46729d73a27fb57e9";

/// A 32-byte SHA-256 content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Compute the SHA-256 digest of the given data.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// The digest of the literal `"0"`, used as the previous-digest of the
    /// first document in a chain.
    pub fn placeholder() -> Self {
        Self::of(b"0")
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidEncoding(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }

    /// Base64 of the raw 32 bytes.
    pub fn to_base64(&self) -> String {
        B64.encode(self.0)
    }

    /// Parse from base64 of the raw 32 bytes.
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = B64
            .decode(s.trim())
            .map_err(|e| CoreError::InvalidEncoding(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = slice.try_into().map_err(|_| {
            CoreError::InvalidEncoding(format!("digest must be 32 bytes, got {}", slice.len()))
        })?;
        Ok(Self(arr))
    }
}

/// Identifier of an issuing entity, typically the seller's tax number.
///
/// Scopes one hash chain in the ledger.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The chain position of an entity after its most recent committed stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Counter of the last committed document (starts at 1).
    pub counter: u64,
    /// Digest of the last committed document.
    pub last_digest: Digest,
}

impl SequenceRecord {
    pub const fn new(counter: u64, last_digest: Digest) -> Self {
        Self {
            counter,
            last_digest,
        }
    }

    /// The counter the next document will receive.
    pub const fn next_counter(&self) -> u64 {
        self.counter + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_digest_of_zero() {
        assert_eq!(Digest::placeholder().to_hex(), PLACEHOLDER_DIGEST_HEX);
    }

    #[test]
    fn test_digest_hex_roundtrip() {
        let d = Digest::of(b"invoice");
        let recovered = Digest::from_hex(&d.to_hex()).unwrap();
        assert_eq!(d, recovered);
        assert_eq!(d.to_hex().len(), 64);
    }

    #[test]
    fn test_digest_base64_is_raw_bytes() {
        let d = Digest::from_bytes([0xab; 32]);
        let b64 = d.to_base64();
        assert_eq!(B64.decode(&b64).unwrap(), vec![0xab; 32]);
        assert_eq!(Digest::from_base64(&b64).unwrap(), d);
    }

    #[test]
    fn test_digest_wrong_length_rejected() {
        assert!(Digest::from_hex("abcd").is_err());
        assert!(Digest::from_base64("AAAA").is_err());
    }

    #[test]
    fn test_digest_debug() {
        let d = Digest::from_bytes([0xcd; 32]);
        assert_eq!(format!("{:?}", d), "Digest(cdcdcdcdcdcdcdcd)");
    }

    #[test]
    fn test_sequence_record_next() {
        let rec = SequenceRecord::new(7, Digest::placeholder());
        assert_eq!(rec.next_counter(), 8);
    }
}
