//! Checking stamped documents and chains of stamp results.

use invoice_stamp_core::{
    canonicalize, Digest, EcPublicKey, EcSignature, Element, StructuredDocument, TlvPayload,
};
use thiserror::Error;

use crate::config::StampConfig;
use crate::error::{Result, StampError};
use crate::result::StampResult;

/// Outcome of [`verify_stamp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampReport {
    /// Digest recomputed from the document content.
    pub digest: Digest,
    /// The embedded signature verifies against `digest` with the given key.
    pub signature_valid: bool,
    /// The payload's digest field equals `digest`.
    pub payload_digest_matches: bool,
    /// The payload's signature field equals the embedded signature.
    pub payload_signature_matches: bool,
    /// Sequence counter reference, if present and numeric.
    pub counter: Option<u64>,
    /// Previous-digest reference, if present and well formed.
    pub previous_digest: Option<Digest>,
    pub payload: TlvPayload,
}

impl StampReport {
    pub fn is_valid(&self) -> bool {
        self.signature_valid && self.payload_digest_matches && self.payload_signature_matches
    }
}

/// Verify a stamped document with the default configuration.
pub fn verify_stamp(document: &StructuredDocument, public_key: &EcPublicKey) -> Result<StampReport> {
    verify_stamp_with(document, public_key, &StampConfig::default())
}

/// Verify a stamped document.
///
/// A document without a signature or payload reference is malformed; a
/// document whose stamp does not match its content yields a report with
/// `is_valid() == false`.
pub fn verify_stamp_with(
    document: &StructuredDocument,
    public_key: &EcPublicKey,
    config: &StampConfig,
) -> Result<StampReport> {
    let digest = canonicalize(document, &config.exclusion)?.digest();
    let root = document.root();

    let signature_text = root
        .first_child(&config.exclusion.signature)
        .and_then(|s| s.first_child("SignatureValue"))
        .map(|v| v.text_content())
        .ok_or_else(|| StampError::malformed("verify", "no signature value"))?;
    let signature = EcSignature::from_base64(signature_text.trim())?;

    let payload_text = reference(root, config, &config.markers.qr)
        .and_then(attachment_text)
        .ok_or_else(|| StampError::malformed("verify", "no payload reference"))?;
    let payload = TlvPayload::decode(&payload_text)?;

    let counter = reference(root, config, &config.markers.counter)
        .and_then(|e| e.first_child("UUID"))
        .and_then(|e| e.text_content().trim().parse().ok());
    let previous_digest = reference(root, config, &config.markers.previous_digest)
        .and_then(attachment_text)
        .and_then(|t| Digest::from_base64(&t).ok());

    Ok(StampReport {
        signature_valid: public_key.verify(&digest, &signature),
        payload_digest_matches: payload.get_str(config.tags.digest) == Some(digest.to_hex().as_str()),
        payload_signature_matches: payload.get_str(config.tags.signature)
            == Some(signature.to_base64().as_str()),
        digest,
        counter,
        previous_digest,
        payload,
    })
}

fn reference<'a>(root: &'a Element, config: &StampConfig, marker: &str) -> Option<&'a Element> {
    let rules = &config.exclusion;
    root.elements()
        .find(|e| e.is(&rules.reference) && rules.reference_marker(e) == Some(marker))
}

fn attachment_text(reference: &Element) -> Option<String> {
    reference
        .find_path(&["Attachment", "EmbeddedDocumentBinaryObject"])
        .map(|e| e.text_content().trim().to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Chains
// ─────────────────────────────────────────────────────────────────────────────

/// First broken position in a sequence of stamp results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("position {position}: expected counter {expected}, found {found}")]
    CounterGap {
        position: usize,
        expected: u64,
        found: u64,
    },

    #[error("counter {counter}: previous digest {found} does not match {expected}")]
    BrokenLink {
        counter: u64,
        expected: Digest,
        found: Digest,
    },

    #[error("position {position}: entity {found} differs from {expected}")]
    MixedEntities {
        position: usize,
        expected: String,
        found: String,
    },
}

/// Check that `results` form one chain: a single entity, counters 1..=N,
/// the first previous digest equal to `placeholder`, and every later one
/// equal to the digest before it.
pub fn verify_chain(results: &[StampResult], placeholder: &Digest) -> std::result::Result<(), ChainError> {
    let mut expected_previous = *placeholder;

    for (position, result) in results.iter().enumerate() {
        if result.entity != results[0].entity {
            return Err(ChainError::MixedEntities {
                position,
                expected: results[0].entity.to_string(),
                found: result.entity.to_string(),
            });
        }

        let expected_counter = position as u64 + 1;
        if result.counter != expected_counter {
            return Err(ChainError::CounterGap {
                position,
                expected: expected_counter,
                found: result.counter,
            });
        }

        if result.previous_digest != expected_previous {
            return Err(ChainError::BrokenLink {
                counter: result.counter,
                expected: expected_previous,
                found: result.previous_digest,
            });
        }
        expected_previous = result.digest;
    }

    Ok(())
}
