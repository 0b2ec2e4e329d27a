//! DocumentStamper: the stamping pipeline.
//!
//! One call runs, in order: canonicalize, digest, sign, reserve the chain
//! position, build the TLV payload, commit, and append the stamp elements.
//! The digest and signature are computed once; only the ledger round and the
//! payload are repeated when a commit loses a race.

use invoice_stamp_core::{
    canonicalize, strip_pem, Digest, EcKeypair, EcSignature, Element, EntityId,
    StructuredDocument, TlvPayload,
};
use invoice_stamp_ledger::{ChainLedger, LedgerError};
use tracing::{debug, info, instrument, warn};

use crate::config::StampConfig;
use crate::error::{Result, StampError};
use crate::keys::KeyMaterial;
use crate::result::StampResult;
use crate::summary::InvoiceSummary;

/// UBL aggregate components.
pub const CAC_NAMESPACE: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
/// UBL basic components.
pub const CBC_NAMESPACE: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
/// XML digital signature.
pub const DS_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";

const SIGNATURE_ID: &str = "urn:oasis:names:specification:ubl:signature:Invoice";
const SIGNATURE_METHOD: &str = "urn:oasis:names:specification:ubl:dsig:enveloped:xades";

/// Stamps documents against one ledger with one configuration.
pub struct DocumentStamper<L> {
    ledger: L,
    config: StampConfig,
}

impl<L: ChainLedger> DocumentStamper<L> {
    /// Create a stamper. Fails if `config` is inconsistent or its placeholder
    /// differs from the ledger's.
    pub fn new(ledger: L, config: StampConfig) -> Result<Self> {
        config.validate()?;
        if config.placeholder()? != ledger.placeholder() {
            return Err(StampError::Config(
                "ledger placeholder digest differs from configuration".into(),
            ));
        }
        Ok(Self { ledger, config })
    }

    /// Create a stamper with the default configuration.
    pub fn with_defaults(ledger: L) -> Result<Self> {
        Self::new(ledger, StampConfig::default())
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &StampConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stamping
    // ─────────────────────────────────────────────────────────────────────────

    /// Stamp `document` in place for `entity`.
    ///
    /// The payload summary is read from the document. On error the document
    /// is untouched and the ledger unchanged.
    #[instrument(skip(self, document, keys, entity), fields(entity = %entity))]
    pub fn stamp(
        &self,
        document: &mut StructuredDocument,
        entity: &EntityId,
        keys: &dyn KeyMaterial,
    ) -> Result<StampResult> {
        let summary = InvoiceSummary::from_document(document, &self.config.summary)?;
        self.stamp_with_summary(document, entity, keys, &summary)
    }

    /// Stamp `document` using a caller-supplied summary.
    pub fn stamp_with_summary(
        &self,
        document: &mut StructuredDocument,
        entity: &EntityId,
        keys: &dyn KeyMaterial,
        summary: &InvoiceSummary,
    ) -> Result<StampResult> {
        let canonical = canonicalize(document, &self.config.exclusion)?;
        let digest = canonical.digest();
        debug!(bytes = canonical.len(), digest = ?digest, "canonicalized");

        let keypair = EcKeypair::from_pem(&keys.private_key_pem()?)?;
        let signature = keypair.sign(&digest)?;
        let public_key = if self.config.embed_public_key {
            match keys.public_key_pem() {
                Ok(pem) => Some(strip_pem(&pem)),
                Err(e) => {
                    warn!(error = %e, "no public key resolvable, omitting it from the payload");
                    None
                }
            }
        } else {
            None
        };
        debug!("signed");

        let attempts = self.config.max_commit_attempts;
        for attempt in 1..=attempts {
            match self.commit_round(entity, summary, &digest, &signature, public_key.as_deref()) {
                Ok((result, stamp)) => {
                    apply_stamp(document, &self.config, stamp);
                    info!(counter = result.counter, digest = ?digest, attempt, "document stamped");
                    return Ok(result);
                }
                Err(e) if e.is_contention() => {
                    warn!(attempt, attempts, error = %e, "ledger contention, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StampError::Contention {
            entity: entity.to_string(),
            attempts,
        })
    }

    /// Parse XML, stamp it, and return the stamped XML.
    pub fn stamp_xml(
        &self,
        xml: &str,
        entity: &EntityId,
        keys: &dyn KeyMaterial,
    ) -> Result<(String, StampResult)> {
        let mut document = StructuredDocument::parse(xml)?;
        let result = self.stamp(&mut document, entity, keys)?;
        Ok((document.to_xml_string(), result))
    }

    /// One reserve/build/commit round. The returned elements are ready to be
    /// appended; nothing has touched the document yet.
    fn commit_round(
        &self,
        entity: &EntityId,
        summary: &InvoiceSummary,
        digest: &Digest,
        signature: &EcSignature,
        public_key: Option<&str>,
    ) -> std::result::Result<(StampResult, StampElements), LedgerError> {
        let reservation = self
            .ledger
            .reserve_within(entity, self.config.reserve_timeout())?;
        let counter = reservation.counter();
        let previous_digest = *reservation.previous_digest();

        let payload = build_payload(&self.config, summary, digest, signature, public_key);
        let encoded_payload = payload.encode();
        let stamp = StampElements::build(
            &self.config,
            counter,
            &previous_digest,
            &encoded_payload,
            signature,
        );

        self.ledger.commit(reservation, *digest)?;

        let result = StampResult {
            entity: entity.clone(),
            counter,
            digest: *digest,
            previous_digest,
            signature: signature.to_base64(),
            encoded_payload,
            public_key: public_key.map(str::to_string),
        };
        Ok((result, stamp))
    }
}

/// Assemble the scanner payload in tag order.
pub fn build_payload(
    config: &StampConfig,
    summary: &InvoiceSummary,
    digest: &Digest,
    signature: &EcSignature,
    public_key: Option<&str>,
) -> TlvPayload {
    let tags = &config.tags;
    let mut payload = TlvPayload::new()
        .with(tags.seller_name, summary.seller_name.clone())
        .with(tags.vat_number, summary.vat_number.clone())
        .with(tags.timestamp, summary.timestamp.clone())
        .with(tags.total_with_vat, summary.total_with_vat.clone())
        .with(tags.vat_total, summary.vat_total.clone())
        .with(tags.digest, digest.to_hex())
        .with(tags.signature, signature.to_base64());
    if let Some(key) = public_key {
        payload.push(tags.public_key, key.to_string());
    }
    payload
}

// ─────────────────────────────────────────────────────────────────────────────
// Stamp elements
// ─────────────────────────────────────────────────────────────────────────────

/// The four elements a stamp adds, built before the document is touched.
#[derive(Debug, Clone)]
pub struct StampElements {
    pub counter: Element,
    pub previous_digest: Element,
    pub qr: Element,
    pub signature: Element,
}

impl StampElements {
    pub fn build(
        config: &StampConfig,
        counter: u64,
        previous_digest: &Digest,
        encoded_payload: &str,
        signature: &EcSignature,
    ) -> Self {
        let markers = &config.markers;
        Self {
            counter: reference(&markers.counter)
                .child(cbc("UUID").text(counter.to_string())),
            previous_digest: reference(&markers.previous_digest)
                .child(attachment(&previous_digest.to_base64())),
            qr: reference(&markers.qr).child(attachment(encoded_payload)),
            signature: Element::qualified(Some("cac"), CAC_NAMESPACE, "Signature")
                .child(cbc("ID").text(SIGNATURE_ID))
                .child(cbc("SignatureMethod").text(SIGNATURE_METHOD))
                .child(
                    Element::qualified(Some("ds"), DS_NAMESPACE, "SignatureValue")
                        .text(signature.to_base64()),
                ),
        }
    }
}

fn cbc(local: &str) -> Element {
    Element::qualified(Some("cbc"), CBC_NAMESPACE, local)
}

fn reference(marker: &str) -> Element {
    Element::qualified(Some("cac"), CAC_NAMESPACE, "AdditionalDocumentReference")
        .child(cbc("ID").text(marker))
}

fn attachment(content: &str) -> Element {
    Element::qualified(Some("cac"), CAC_NAMESPACE, "Attachment").child(
        cbc("EmbeddedDocumentBinaryObject")
            .attr("mimeCode", "text/plain")
            .text(content),
    )
}

/// Replace any earlier stamp on the root with `stamp`, appended last.
fn apply_stamp(document: &mut StructuredDocument, config: &StampConfig, stamp: StampElements) {
    let rules = &config.exclusion;
    let markers = config.markers.all();
    let root = document.root_mut();

    let removed = root.remove_children_where(|e| {
        e.is(&rules.signature)
            || (e.is(&rules.reference)
                && rules
                    .reference_marker(e)
                    .map(|m| markers.contains(&m))
                    .unwrap_or(false))
    });
    if removed > 0 {
        debug!(removed, "replaced previous stamp");
    }

    root.push_child(stamp.counter);
    root.push_child(stamp.previous_digest);
    root.push_child(stamp.qr);
    root.push_child(stamp.signature);
}
