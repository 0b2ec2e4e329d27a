//! # Invoice Stamp Testkit
//!
//! Testing utilities for invoice stamping.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Canonical bytes, digests, and TLV encodings with
//!   expected outputs for cross-implementation verification
//! - **Generators**: Proptest strategies for keys, digests, payload fields,
//!   and whole invoices rendered with varying layout
//! - **Fixtures**: A sample invoice and a ready-made stamper
//!
//! ## Golden Vectors
//!
//! ```rust
//! use invoice_stamp_testkit::vectors::verify_all_vectors;
//!
//! for outcome in verify_all_vectors() {
//!     assert!(outcome.matches, "{}", outcome.name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use invoice_stamp_testkit::generators::{invoice_from_params, InvoiceParams, Layout};
//!
//! proptest! {
//!     #[test]
//!     fn layout_does_not_change_digest(params: InvoiceParams, a: Layout, b: Layout) {
//!         // canonicalize both renderings and compare
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use invoice_stamp_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let (document, result) = fixture.stamp_invoice("INV-0001");
//! assert_eq!(result.counter, 1);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{invoice_xml, multi_entity_fixtures, TestFixture, SAMPLE_INVOICE};
pub use generators::{invoice_from_params, InvoiceParams, Layout};
pub use vectors::{canonical_vectors, tlv_vectors, verify_all_vectors, GoldenVector, TlvVector};
