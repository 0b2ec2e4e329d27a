//! Golden test vectors for deterministic verification.
//!
//! These pin the exact canonical bytes, digests, and TLV encodings so any
//! other implementation of the stamp can be checked against this one.

use invoice_stamp_core::{canonicalize_xml, Digest, ExclusionRules, TlvPayload};
use serde::Serialize;

/// Base64 of the raw placeholder digest, as written into the first
/// previous-digest reference of every chain.
pub const PLACEHOLDER_BASE64: &str = "X+zrZv/IbzjZUnhsbWlsecLbwjndTpG0ZynXOif7V+k=";

/// A canonicalization vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Input document text.
    pub input: &'static str,
    /// Expected canonical form.
    pub expected_canonical: &'static str,
    /// Expected SHA-256 of the canonical form (hex).
    pub expected_digest: &'static str,
}

/// A TLV encoding vector.
#[derive(Debug, Clone)]
pub struct TlvVector {
    pub name: &'static str,
    pub fields: Vec<(u8, &'static [u8])>,
    pub expected_base64: &'static str,
}

/// Outcome of checking one vector.
#[derive(Debug, Clone, Serialize)]
pub struct VectorOutcome {
    pub name: String,
    pub matches: bool,
    pub actual: String,
}

const CANONICAL_NAMESPACED: &str =
    r#"<Invoice xmlns="urn:x"><cbc:ID xmlns:cbc="urn:cbc">1</cbc:ID><Note a="1" b="2"></Note></Invoice>"#;
const DIGEST_NAMESPACED: &str = "c9ce746b0a287f91ebf704d72bc45d3ac9cc64e0b899d15fbc71de8d50dc8a33";

/// Get all canonicalization vectors.
pub fn canonical_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "namespaced invoice with unordered attributes",
            input: r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:x" xmlns:cbc="urn:cbc">
    <cbc:ID>1</cbc:ID>
    <!-- comment -->
    <Note b="2" a="1"/>
</Invoice>"#,
            expected_canonical: CANONICAL_NAMESPACED,
            expected_digest: DIGEST_NAMESPACED,
        },
        GoldenVector {
            name: "same invoice carrying a stamp",
            input: r#"<Invoice xmlns="urn:x" xmlns:cbc="urn:cbc"><cbc:ID>1</cbc:ID><Note a="1" b="2"/><AdditionalDocumentReference><cbc:ID>ICV</cbc:ID><cbc:UUID>7</cbc:UUID></AdditionalDocumentReference><AdditionalDocumentReference><cbc:ID>QR</cbc:ID></AdditionalDocumentReference><Signature><cbc:ID>sig</cbc:ID></Signature></Invoice>"#,
            expected_canonical: CANONICAL_NAMESPACED,
            expected_digest: DIGEST_NAMESPACED,
        },
        GoldenVector {
            name: "single text element",
            input: "<a>0</a>",
            expected_canonical: "<a>0</a>",
            expected_digest: "95355fe03b1d2a9129893ec2edcd3a29d78214d0b6a7d2e946e06b62c09c03ff",
        },
    ]
}

/// Get all TLV vectors.
pub fn tlv_vectors() -> Vec<TlvVector> {
    vec![
        TlvVector {
            name: "invoice summary fields",
            fields: vec![
                (1, &b"Acme Trading"[..]),
                (2, &b"399999999900003"[..]),
                (3, &b"2022-08-17T17:41:08"[..]),
                (4, &b"115.00"[..]),
                (5, &b"15.00"[..]),
            ],
            expected_base64:
                "AQxBY21lIFRyYWRpbmcCDzM5OTk5OTk5OTkwMDAwMwMTMjAyMi0wOC0xN1QxNzo0MTowOAQGMTE1LjAwBQUxNS4wMA==",
        },
        TlvVector {
            name: "empty value",
            fields: vec![(8, &b""[..])],
            expected_base64: "CAA=",
        },
    ]
}

/// Canonicalize a vector's input with the default exclusion rules.
pub fn canonical_from_vector(vector: &GoldenVector) -> (String, Digest) {
    match canonicalize_xml(vector.input, &ExclusionRules::default()) {
        Ok(bytes) => {
            let digest = bytes.digest();
            (String::from_utf8_lossy(bytes.as_bytes()).into_owned(), digest)
        }
        Err(e) => (format!("error: {}", e), Digest::from_bytes([0; 32])),
    }
}

/// Encode a TLV vector's fields.
pub fn encode_from_vector(vector: &TlvVector) -> String {
    vector
        .fields
        .iter()
        .fold(TlvPayload::new(), |p, (tag, value)| p.with(*tag, value.to_vec()))
        .encode()
}

/// Check every vector.
pub fn verify_all_vectors() -> Vec<VectorOutcome> {
    let canonical = canonical_vectors().into_iter().map(|v| {
        let (text, digest) = canonical_from_vector(&v);
        VectorOutcome {
            name: v.name.to_string(),
            matches: text == v.expected_canonical && digest.to_hex() == v.expected_digest,
            actual: hex::encode(digest.as_bytes()),
        }
    });
    let tlv = tlv_vectors().into_iter().map(|v| {
        let encoded = encode_from_vector(&v);
        VectorOutcome {
            name: v.name.to_string(),
            matches: encoded == v.expected_base64,
            actual: encoded,
        }
    });
    canonical.chain(tlv).collect()
}

/// All vector outcomes as JSON, for comparing with other implementations.
pub fn report_json() -> String {
    serde_json::to_string_pretty(&verify_all_vectors()).unwrap_or_default()
}
