//! # Invoice Stamp
//!
//! Compliance stamping for structured invoices.
//!
//! ## Overview
//!
//! Stamping a document:
//!
//! - **Canonicalizes** it, excluding any earlier stamp content
//! - **Digests** the canonical bytes with SHA-256 and **signs** the digest
//!   with ECDSA over secp256k1
//! - **Chains** it to the issuing entity's previous document through a
//!   counter and the previous document's digest
//! - **Encodes** a TLV payload for scanners and appends the stamp elements
//!
//! ## Usage
//!
//! ```rust,no_run
//! use invoice_stamp::{DocumentStamper, StampConfig};
//! use invoice_stamp::core::{EcKeypair, EntityId, StructuredDocument};
//! use invoice_stamp::ledger::SqliteLedger;
//!
//! let ledger = SqliteLedger::open("ledger.db", invoice_stamp::core::Digest::placeholder()).unwrap();
//! let stamper = DocumentStamper::new(ledger, StampConfig::default()).unwrap();
//!
//! let keys = EcKeypair::generate();
//! let mut document = StructuredDocument::parse("<Invoice>...</Invoice>").unwrap();
//! let result = stamper
//!     .stamp(&mut document, &EntityId::from("399999999900003"), &keys)
//!     .unwrap();
//!
//! println!("{}", result.to_json().unwrap());
//! ```
//!
//! ## Re-exports
//!
//! - `invoice_stamp::core` - Document tree, canonicalization, crypto, TLV
//! - `invoice_stamp::ledger` - Chain ledger trait and backends

pub mod config;
pub mod error;
pub mod keys;
pub mod result;
pub mod stamper;
pub mod summary;
pub mod verify;

// Re-export component crates
pub use invoice_stamp_core as core;
pub use invoice_stamp_ledger as ledger;

pub use config::{Markers, StampConfig, SummaryPaths, TagConvention};
pub use error::{ErrorKind, Result, StampError};
pub use keys::{FileKeyMaterial, KeyMaterial, PemKeyMaterial};
pub use result::StampResult;
pub use stamper::{build_payload, DocumentStamper, StampElements};
pub use summary::InvoiceSummary;
pub use verify::{verify_chain, verify_stamp, verify_stamp_with, ChainError, StampReport};

// Re-export commonly used types
pub use invoice_stamp_core::{Digest, EcKeypair, EcPublicKey, EntityId, StructuredDocument};
pub use invoice_stamp_ledger::{ChainLedger, MemoryLedger, SqliteLedger};
