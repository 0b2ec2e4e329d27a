//! A stamped document whose content changes no longer verifies.

use invoice_stamp::{verify_stamp, StructuredDocument};
use invoice_stamp_testkit::fixtures::TestFixture;

fn reparse(xml: &str) -> StructuredDocument {
    StructuredDocument::parse(xml).unwrap()
}

#[test]
fn test_untouched_document_verifies() {
    let fixture = TestFixture::with_seed(9);
    let (doc, _) = fixture.stamp_invoice("T-1");

    let report = verify_stamp(&reparse(&doc.to_xml_string()), &fixture.public_key()).unwrap();
    assert!(report.is_valid());
}

#[test]
fn test_changed_total_breaks_signature() {
    let fixture = TestFixture::with_seed(9);
    let (doc, result) = fixture.stamp_invoice("T-2");

    let xml = doc.to_xml_string();
    let tampered = xml.replace(
        ">115.00</cbc:TaxInclusiveAmount>",
        ">1150.00</cbc:TaxInclusiveAmount>",
    );
    assert_ne!(xml, tampered);

    let report = verify_stamp(&reparse(&tampered), &fixture.public_key()).unwrap();
    assert_ne!(report.digest, result.digest);
    assert!(!report.signature_valid);
    assert!(!report.payload_digest_matches);
    assert!(!report.is_valid());
}

#[test]
fn test_formatting_changes_do_not_break_signature() {
    let fixture = TestFixture::with_seed(9);
    let (doc, result) = fixture.stamp_invoice("T-3");

    let reformatted = doc
        .to_xml_string()
        .replace("</cbc:ID>", "</cbc:ID>\n      ");
    let report = verify_stamp(&reparse(&reformatted), &fixture.public_key()).unwrap();
    assert_eq!(report.digest, result.digest);
    assert!(report.is_valid());
}

#[test]
fn test_wrong_key_does_not_verify() {
    let fixture = TestFixture::with_seed(9);
    let stranger = TestFixture::with_seed(10);
    let (doc, _) = fixture.stamp_invoice("T-4");

    let report = verify_stamp(&doc, &stranger.public_key()).unwrap();
    assert!(!report.signature_valid);
    assert!(report.payload_digest_matches);
}
