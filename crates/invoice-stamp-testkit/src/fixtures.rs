//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use invoice_stamp::{DocumentStamper, StampConfig, StampResult};
use invoice_stamp_core::{EcKeypair, EcPublicKey, EntityId, StructuredDocument};
use invoice_stamp_ledger::{ChainLedger, MemoryLedger};

/// Seller tax number used by the sample invoices.
pub const SAMPLE_VAT_NUMBER: &str = "399999999900003";

/// A simplified UBL tax invoice.
pub const SAMPLE_INVOICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"
         xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
         xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2"
         xmlns:ext="urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2">
    <ext:UBLExtensions>
        <ext:UBLExtension>
            <ext:ExtensionURI>urn:oasis:names:specification:ubl:dsig:enveloped:xades</ext:ExtensionURI>
        </ext:UBLExtension>
    </ext:UBLExtensions>
    <cbc:ProfileID>reporting:1.0</cbc:ProfileID>
    <cbc:ID>SME00010</cbc:ID>
    <cbc:UUID>8e6000cf-1a98-4174-b3e7-b5d5954bc10d</cbc:UUID>
    <cbc:IssueDate>2022-08-17</cbc:IssueDate>
    <cbc:IssueTime>17:41:08</cbc:IssueTime>
    <cbc:InvoiceTypeCode name="0200000">388</cbc:InvoiceTypeCode>
    <cbc:DocumentCurrencyCode>SAR</cbc:DocumentCurrencyCode>
    <cac:AccountingSupplierParty>
        <cac:Party>
            <cac:PartyIdentification>
                <cbc:ID schemeID="CRN">1010010000</cbc:ID>
            </cac:PartyIdentification>
            <cac:PartyTaxScheme>
                <cbc:CompanyID>399999999900003</cbc:CompanyID>
                <cac:TaxScheme><cbc:ID>VAT</cbc:ID></cac:TaxScheme>
            </cac:PartyTaxScheme>
            <cac:PartyLegalEntity>
                <cbc:RegistrationName>Acme Trading</cbc:RegistrationName>
            </cac:PartyLegalEntity>
        </cac:Party>
    </cac:AccountingSupplierParty>
    <cac:TaxTotal>
        <cbc:TaxAmount currencyID="SAR">15.00</cbc:TaxAmount>
    </cac:TaxTotal>
    <cac:LegalMonetaryTotal>
        <cbc:LineExtensionAmount currencyID="SAR">100.00</cbc:LineExtensionAmount>
        <cbc:TaxExclusiveAmount currencyID="SAR">100.00</cbc:TaxExclusiveAmount>
        <cbc:TaxInclusiveAmount currencyID="SAR">115.00</cbc:TaxInclusiveAmount>
        <cbc:PayableAmount currencyID="SAR">115.00</cbc:PayableAmount>
    </cac:LegalMonetaryTotal>
    <cac:InvoiceLine>
        <cbc:ID>1</cbc:ID>
        <cbc:InvoicedQuantity unitCode="PCE">2</cbc:InvoicedQuantity>
        <cbc:LineExtensionAmount currencyID="SAR">100.00</cbc:LineExtensionAmount>
        <cac:Item><cbc:Name>Widget</cbc:Name></cac:Item>
    </cac:InvoiceLine>
</Invoice>
"#;

/// The sample invoice with a different ID and totals.
pub fn invoice_xml(id: &str, total_with_vat: &str, vat_total: &str) -> String {
    SAMPLE_INVOICE
        .replace("<cbc:ID>SME00010</cbc:ID>", &format!("<cbc:ID>{}</cbc:ID>", id))
        .replace(
            "<cbc:TaxInclusiveAmount currencyID=\"SAR\">115.00</cbc:TaxInclusiveAmount>",
            &format!(
                "<cbc:TaxInclusiveAmount currencyID=\"SAR\">{}</cbc:TaxInclusiveAmount>",
                total_with_vat
            ),
        )
        .replace(
            "<cbc:TaxAmount currencyID=\"SAR\">15.00</cbc:TaxAmount>",
            &format!("<cbc:TaxAmount currencyID=\"SAR\">{}</cbc:TaxAmount>", vat_total),
        )
}

/// Parse an invoice produced by [`invoice_xml`] or [`SAMPLE_INVOICE`].
pub fn parse(xml: &str) -> StructuredDocument {
    StructuredDocument::parse(xml).expect("fixture invoice parses")
}

/// A keypair from a fixed scalar. `byte` must be non-zero.
pub fn fixed_keypair(byte: u8) -> EcKeypair {
    EcKeypair::from_scalar(&[byte; 32]).expect("fixture scalar in range")
}

/// A test fixture with a keypair, an entity, and a stamper.
pub struct TestFixture<L: ChainLedger = MemoryLedger> {
    pub keypair: EcKeypair,
    pub entity: EntityId,
    pub stamper: DocumentStamper<L>,
}

impl TestFixture<MemoryLedger> {
    /// Create a new test fixture with a random keypair and a memory ledger.
    pub fn new() -> Self {
        Self::with_keypair(EcKeypair::generate())
    }

    /// Create with a deterministic keypair.
    pub fn with_seed(byte: u8) -> Self {
        Self::with_keypair(fixed_keypair(byte))
    }

    fn with_keypair(keypair: EcKeypair) -> Self {
        Self::with_ledger(keypair, MemoryLedger::default())
    }
}

impl Default for TestFixture<MemoryLedger> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ChainLedger> TestFixture<L> {
    /// Create over any ledger with the default configuration.
    pub fn with_ledger(keypair: EcKeypair, ledger: L) -> Self {
        let stamper = DocumentStamper::new(ledger, StampConfig::default())
            .expect("default configuration matches the ledger");
        Self {
            keypair,
            entity: EntityId::from(SAMPLE_VAT_NUMBER),
            stamper,
        }
    }

    pub fn public_key(&self) -> EcPublicKey {
        self.keypair.public_key()
    }

    /// Stamp an invoice with the given ID, returning the stamped document.
    pub fn stamp_invoice(&self, id: &str) -> (StructuredDocument, StampResult) {
        let mut doc = parse(&invoice_xml(id, "115.00", "15.00"));
        let result = self
            .stamper
            .stamp(&mut doc, &self.entity, &self.keypair)
            .expect("fixture invoice stamps");
        (doc, result)
    }

    /// Stamp `count` distinct invoices in order.
    pub fn stamp_chain(&self, count: usize) -> Vec<StampResult> {
        (1..=count)
            .map(|i| self.stamp_invoice(&format!("INV-{:04}", i)).1)
            .collect()
    }
}

/// Create multiple fixtures with distinct entities sharing nothing.
///
/// Keys cycle through the 255 non-zero seeds, so beyond that many fixtures
/// keys repeat while entities stay distinct.
pub fn multi_entity_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let seed = (i % usize::from(u8::MAX)) as u8 + 1;
            let mut fixture = TestFixture::with_seed(seed);
            fixture.entity = EntityId::from(format!("3000000000{:05}", i));
            fixture
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoice_stamp::verify_chain;
    use invoice_stamp_core::Digest;

    #[test]
    fn test_fixture_chain() {
        let fixture = TestFixture::with_seed(7);
        let results = fixture.stamp_chain(3);
        assert_eq!(
            results.iter().map(|r| r.counter).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        verify_chain(&results, &Digest::placeholder()).unwrap();
    }

    #[test]
    fn test_invoice_variants_differ() {
        let a = invoice_xml("A", "115.00", "15.00");
        let b = invoice_xml("A", "116.00", "15.00");
        assert_ne!(a, b);
        assert!(b.contains(">116.00<"));
    }

    #[test]
    fn test_multi_entity() {
        let fixtures = multi_entity_fixtures(3);
        for fixture in &fixtures {
            let (_, result) = fixture.stamp_invoice("X");
            assert_eq!(result.counter, 1);
        }
        assert_ne!(fixtures[0].entity, fixtures[1].entity);
    }

    #[test]
    fn test_many_fixtures_cycle_seeds() {
        let fixtures = multi_entity_fixtures(300);
        assert_eq!(fixtures.len(), 300);
        assert_eq!(fixtures[0].public_key(), fixtures[255].public_key());
        assert_ne!(fixtures[0].public_key(), fixtures[254].public_key());

        let mut entities: Vec<_> = fixtures.iter().map(|f| f.entity.clone()).collect();
        entities.sort();
        entities.dedup();
        assert_eq!(entities.len(), 300);
    }
}
