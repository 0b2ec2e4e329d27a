//! Proptest generators for property-based testing.

use proptest::prelude::*;

use invoice_stamp_core::{Digest, EcKeypair, EntityId, TlvField};
use invoice_stamp::InvoiceSummary;

/// Generate a keypair from a random in-range scalar.
pub fn keypair() -> impl Strategy<Value = EcKeypair> {
    any::<[u8; 32]>().prop_filter_map("scalar out of range", |s| EcKeypair::from_scalar(&s).ok())
}

/// Generate a random Digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest::from_bytes)
}

/// Generate a 15-digit tax number.
pub fn entity_id() -> impl Strategy<Value = EntityId> {
    "3[0-9]{13}3".prop_map(EntityId::from)
}

/// Generate a TLV field with a value of at most `max_len` bytes.
pub fn tlv_field(max_len: usize) -> impl Strategy<Value = TlvField> {
    (1u8..=255, prop::collection::vec(any::<u8>(), 0..=max_len))
        .prop_map(|(tag, value)| TlvField::new(tag, value))
}

/// Generate a monetary amount with two decimals.
pub fn amount() -> impl Strategy<Value = String> {
    (0u32..10_000_000, 0u32..100).prop_map(|(units, cents)| format!("{}.{:02}", units, cents))
}

/// Generate plain text safe to embed in XML without escaping.
pub fn text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 .,-]{0,39}".prop_map(String::from)
}

/// Generate an invoice summary.
pub fn summary() -> impl Strategy<Value = InvoiceSummary> {
    (text(), "3[0-9]{13}3", amount(), amount()).prop_map(|(seller, vat, total, tax)| {
        InvoiceSummary {
            seller_name: seller,
            vat_number: vat,
            timestamp: "2024-01-31T09:15:00".to_string(),
            total_with_vat: total,
            vat_total: tax,
        }
    })
}

/// Parameters for generating an invoice document.
#[derive(Debug, Clone)]
pub struct InvoiceParams {
    pub id: String,
    pub seller_name: String,
    pub total_with_vat: String,
    pub vat_total: String,
    /// Attributes on a note element, unique names.
    pub note_attributes: Vec<(String, String)>,
}

impl Arbitrary for InvoiceParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            "[A-Z]{3}[0-9]{1,6}",
            text(),
            amount(),
            amount(),
            prop::collection::btree_map("[a-z]{1,8}", "[A-Za-z0-9 ]{0,12}", 0..5),
        )
            .prop_map(|(id, seller_name, total_with_vat, vat_total, attrs)| InvoiceParams {
                id,
                seller_name,
                total_with_vat,
                vat_total,
                note_attributes: attrs.into_iter().collect(),
            })
            .boxed()
    }
}

/// Layout choices that must not change the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Indent with newlines and spaces between elements.
    pub pretty: bool,
    /// Write attributes in reverse order.
    pub reverse_attributes: bool,
    /// Declare the `cbc` prefix on each user instead of the root.
    pub local_declarations: bool,
}

impl Arbitrary for Layout {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<bool>(), any::<bool>(), any::<bool>())
            .prop_map(|(pretty, reverse_attributes, local_declarations)| Layout {
                pretty,
                reverse_attributes,
                local_declarations,
            })
            .boxed()
    }
}

const INVOICE_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
const CAC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
const CBC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

/// Render an invoice from parameters with the given layout.
pub fn invoice_from_params(params: &InvoiceParams, layout: Layout) -> String {
    let (nl, ind) = if layout.pretty { ("\n", "    ") } else { ("", "") };
    let cbc_decl = |on_root: bool| -> String {
        if on_root != layout.local_declarations {
            format!(" xmlns:cbc=\"{}\"", CBC_NS)
        } else {
            String::new()
        }
    };
    let cbc = |name: &str, attrs: &str, value: &str| -> String {
        format!("<cbc:{name}{}{attrs}>{value}</cbc:{name}>", cbc_decl(false))
    };

    let mut attrs: Vec<&(String, String)> = params.note_attributes.iter().collect();
    if layout.reverse_attributes {
        attrs.reverse();
    }
    let note_attrs: String = attrs
        .iter()
        .map(|(k, v)| format!(" {}=\"{}\"", k, v))
        .collect();

    let mut out = String::new();
    out.push_str(&format!(
        "<Invoice xmlns=\"{}\" xmlns:cac=\"{}\"{}>{nl}",
        INVOICE_NS,
        CAC_NS,
        cbc_decl(true)
    ));
    out.push_str(&format!("{ind}{}{nl}", cbc("ID", "", &params.id)));
    out.push_str(&format!("{ind}{}{nl}", cbc("IssueDate", "", "2024-01-31")));
    out.push_str(&format!("{ind}<Note{note_attrs}/>{nl}"));
    out.push_str(&format!(
        "{ind}<cac:AccountingSupplierParty><cac:Party><cac:PartyTaxScheme>{}</cac:PartyTaxScheme><cac:PartyLegalEntity>{}</cac:PartyLegalEntity></cac:Party></cac:AccountingSupplierParty>{nl}",
        cbc("CompanyID", "", "399999999900003"),
        cbc("RegistrationName", "", &params.seller_name),
    ));
    out.push_str(&format!(
        "{ind}<cac:TaxTotal>{}</cac:TaxTotal>{nl}",
        cbc("TaxAmount", " currencyID=\"SAR\"", &params.vat_total)
    ));
    out.push_str(&format!(
        "{ind}<cac:LegalMonetaryTotal>{}</cac:LegalMonetaryTotal>{nl}",
        cbc("TaxInclusiveAmount", " currencyID=\"SAR\"", &params.total_with_vat)
    ));
    out.push_str("</Invoice>");
    out
}
