//! # Invoice Stamp Core
//!
//! Pure primitives for invoice stamping: the document tree, canonical form,
//! SHA-256 digests, ECDSA signatures, and the TLV scanner payload.
//!
//! This crate contains no storage and no chain state. Everything here is a
//! deterministic function of its inputs, except key generation.
//!
//! ## Key Types
//!
//! - [`StructuredDocument`] - Ordered, namespaced element tree
//! - [`CanonicalBytes`] - Output of the canonicalizer, the only input to hashing
//! - [`Digest`] - 32-byte SHA-256 content digest
//! - [`EcKeypair`] / [`EcPublicKey`] / [`EcSignature`] - ECDSA over secp256k1
//! - [`TlvPayload`] - Tag-length-value fields, base64 encoded
//!
//! ## Canonicalization
//!
//! Stamp content (extensions, signatures, and marked references) never takes
//! part in the digest. See the [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod document;
pub mod error;
pub mod tlv;
pub mod types;
pub mod xml;

pub use canonical::{canonicalize, canonicalize_xml, strip_stamp, CanonicalBytes, ExclusionRules};
pub use crypto::{extract_public_key, strip_pem, EcKeypair, EcPublicKey, EcSignature};
pub use document::{Attribute, Element, Name, NamespaceDecl, Node, StructuredDocument};
pub use error::{CoreError, Result};
pub use tlv::{TlvField, TlvPayload, MAX_VALUE_LEN};
pub use types::{Digest, EntityId, SequenceRecord, PLACEHOLDER_DIGEST_HEX};
