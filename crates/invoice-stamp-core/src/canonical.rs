//! Canonical form of a structured document.
//!
//! Canonicalization happens in two pure steps:
//!
//! 1. [`strip_stamp`] builds a new tree without the elements that must never
//!    influence the digest: extension blocks, signatures, and stamp
//!    references identified by a reserved marker.
//! 2. The remaining tree is written in exclusive canonical form:
//!    - namespace declarations appear on the first output element that
//!      visibly uses them, default namespace first, then by prefix
//!    - attributes sorted by (namespace URI, local name)
//!    - no comments, processing instructions, or XML declaration
//!    - whitespace-only text nodes dropped
//!    - empty elements written as start/end tag pairs
//!
//! The same logical content therefore produces identical bytes no matter
//! which code path built the tree or how the source text was indented.

use serde::{Deserialize, Serialize};

use crate::document::{Element, NamespaceDecl, Node, StructuredDocument};
use crate::error::{CoreError, Result};
use crate::types::Digest;
use crate::xml::{escape_attribute, escape_text, NamespaceScope, XML_NAMESPACE};

/// Local names of the elements excluded from hashing.
///
/// All matching is by local name so a signature is recognized whatever
/// prefix or namespace a producer gave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionRules {
    /// Extension container, removed wholesale.
    pub extensions: String,
    /// Signature element, removed wholesale.
    pub signature: String,
    /// Reference element that may carry stamp content.
    pub reference: String,
    /// Child of `reference` whose text identifies it.
    pub reference_id: String,
    /// Identifiers marking a reference as stamp content.
    pub markers: Vec<String>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            extensions: "UBLExtensions".to_string(),
            signature: "Signature".to_string(),
            reference: "AdditionalDocumentReference".to_string(),
            reference_id: "ID".to_string(),
            markers: vec!["QR".to_string(), "ICV".to_string(), "PIH".to_string()],
        }
    }
}

impl ExclusionRules {
    /// True if `element` must not take part in the digest.
    pub fn excludes(&self, element: &Element) -> bool {
        if element.is(&self.extensions) || element.is(&self.signature) {
            return true;
        }
        element.is(&self.reference) && self.reference_marker(element).is_some()
    }

    /// The reserved marker carried by a stamp reference element, if any.
    pub fn reference_marker<'a>(&'a self, element: &Element) -> Option<&'a str> {
        let id = element.first_child(&self.reference_id)?.text_content();
        let id = id.trim();
        self.markers
            .iter()
            .find(|m| m.as_str() == id)
            .map(String::as_str)
    }
}

/// Canonical bytes of a document.
///
/// Only the canonicalizer constructs these, so a digest computed with
/// [`CanonicalBytes::digest`] always covers canonical content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 of these bytes.
    pub fn digest(&self) -> Digest {
        Digest::of(&self.0)
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Return a copy of `element` without any excluded descendants.
///
/// The root itself is never removed.
pub fn strip_stamp(element: &Element, rules: &ExclusionRules) -> Element {
    let children = element
        .children
        .iter()
        .filter_map(|node| match node {
            Node::Element(child) if rules.excludes(child) => None,
            Node::Element(child) => Some(Node::Element(strip_stamp(child, rules))),
            Node::Text(t) => Some(Node::Text(t.clone())),
        })
        .collect();

    Element {
        name: element.name.clone(),
        namespaces: element.namespaces.clone(),
        attributes: element.attributes.clone(),
        children,
    }
}

/// Canonicalize a document, excluding stamp content.
pub fn canonicalize(document: &StructuredDocument, rules: &ExclusionRules) -> Result<CanonicalBytes> {
    let stripped = strip_stamp(document.root(), rules);
    let mut out = String::new();
    let mut rendered = NamespaceScope::default();
    write_canonical(&mut out, &stripped, &mut rendered)?;
    Ok(CanonicalBytes(out.into_bytes()))
}

/// Parse XML text and canonicalize it.
pub fn canonicalize_xml(xml: &str, rules: &ExclusionRules) -> Result<CanonicalBytes> {
    let document = StructuredDocument::parse(xml)?;
    canonicalize(&document, rules)
}

/// Namespace bindings an element visibly utilizes: its own prefix (or the
/// default namespace) and the prefixes of its attributes.
fn visibly_utilized(element: &Element) -> Result<Vec<NamespaceDecl>> {
    let mut used = Vec::with_capacity(1 + element.attributes.len());

    match (&element.name.prefix, &element.name.namespace) {
        (Some(p), None) => {
            return Err(CoreError::malformed(
                "canonicalize",
                format!("prefix {} on element {} has no namespace", p, element.name.local),
            ))
        }
        (prefix, ns) => used.push(NamespaceDecl {
            prefix: prefix.clone(),
            uri: ns.clone().unwrap_or_default(),
        }),
    }

    for attr in &element.attributes {
        match (&attr.name.prefix, &attr.name.namespace) {
            (Some(p), _) if p == "xml" => {}
            (Some(p), Some(ns)) => used.push(NamespaceDecl {
                prefix: Some(p.clone()),
                uri: ns.clone(),
            }),
            (Some(p), None) => {
                return Err(CoreError::malformed(
                    "canonicalize",
                    format!("prefix {} on attribute {} has no namespace", p, attr.name.local),
                ))
            }
            (None, _) => {}
        }
    }

    Ok(used)
}

fn write_canonical(out: &mut String, element: &Element, rendered: &mut NamespaceScope) -> Result<()> {
    let mut declarations: Vec<NamespaceDecl> = Vec::new();
    for decl in visibly_utilized(element)? {
        let in_scope = rendered.resolve(decl.prefix.as_deref()).unwrap_or_default();
        if in_scope != decl.uri && !declarations.iter().any(|d| d.prefix == decl.prefix) {
            declarations.push(decl);
        }
    }
    // `None` sorts before any `Some`, so the default namespace comes first.
    declarations.sort_by(|a, b| a.prefix.cmp(&b.prefix));

    let mut attributes: Vec<_> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let ns_a = attribute_namespace(a.name.prefix.as_deref(), a.name.namespace.as_deref());
        let ns_b = attribute_namespace(b.name.prefix.as_deref(), b.name.namespace.as_deref());
        ns_a.cmp(ns_b).then_with(|| a.name.local.cmp(&b.name.local))
    });

    let qname = element.name.qualified_text();
    out.push('<');
    out.push_str(&qname);
    for decl in &declarations {
        match &decl.prefix {
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        escape_attribute(out, &decl.uri);
        out.push('"');
    }
    for attr in attributes {
        out.push(' ');
        out.push_str(&attr.name.qualified_text());
        out.push_str("=\"");
        escape_attribute(out, &attr.value);
        out.push('"');
    }
    out.push('>');

    rendered.push(declarations);
    for child in &element.children {
        match child {
            Node::Element(e) => write_canonical(out, e, rendered)?,
            Node::Text(t) if t.trim().is_empty() => {}
            Node::Text(t) => escape_text(out, t),
        }
    }
    rendered.pop();

    out.push_str("</");
    out.push_str(&qname);
    out.push('>');
    Ok(())
}

fn attribute_namespace<'a>(prefix: Option<&str>, namespace: Option<&'a str>) -> &'a str {
    match prefix {
        Some("xml") => XML_NAMESPACE,
        _ => namespace.unwrap_or(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INV: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    const CAC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

    fn c14n(xml: &str) -> String {
        let bytes = canonicalize_xml(xml, &ExclusionRules::default()).unwrap();
        String::from_utf8(bytes.into_vec()).unwrap()
    }

    #[test]
    fn test_canonical_exact_output() {
        let out = c14n(r#"<?xml version="1.0"?><a z="1" b="2"><!-- c --><e/></a>"#);
        assert_eq!(out, r#"<a b="2" z="1"><e></e></a>"#);
    }

    #[test]
    fn test_whitespace_and_attribute_order_do_not_matter() {
        let compact = format!(
            r#"<Invoice xmlns="{INV}" xmlns:cbc="{CBC}"><cbc:ID a="1" b="2">X</cbc:ID></Invoice>"#
        );
        let pretty = format!(
            "<Invoice xmlns=\"{INV}\">\n    <cbc:ID xmlns:cbc=\"{CBC}\" b=\"2\"   a=\"1\">X</cbc:ID>\n</Invoice>\n"
        );
        assert_eq!(c14n(&compact), c14n(&pretty));
    }

    #[test]
    fn test_unused_declarations_are_dropped() {
        let out = c14n(&format!(r#"<a xmlns:cac="{CAC}"><b/></a>"#));
        assert_eq!(out, "<a><b></b></a>");
    }

    #[test]
    fn test_declaration_rendered_on_first_user() {
        let out = c14n(&format!(
            r#"<Invoice xmlns="{INV}" xmlns:cbc="{CBC}"><cbc:ID>1</cbc:ID><cbc:Note>n</cbc:Note></Invoice>"#
        ));
        assert_eq!(
            out,
            format!(
                r#"<Invoice xmlns="{INV}"><cbc:ID xmlns:cbc="{CBC}">1</cbc:ID><cbc:Note xmlns:cbc="{CBC}">n</cbc:Note></Invoice>"#
            )
        );
    }

    #[test]
    fn test_tree_built_in_code_matches_parsed_text() {
        let built = StructuredDocument::new(
            Element::qualified(None, INV, "Invoice")
                .child(Element::qualified(Some("cbc"), CBC, "ID").attr("b", "2").attr("a", "1").text("X")),
        );
        let parsed = format!(
            r#"<Invoice xmlns="{INV}" xmlns:cbc="{CBC}"><cbc:ID a="1" b="2">X</cbc:ID></Invoice>"#
        );
        let rules = ExclusionRules::default();
        assert_eq!(
            canonicalize(&built, &rules).unwrap(),
            canonicalize_xml(&parsed, &rules).unwrap()
        );
    }

    #[test]
    fn test_stamp_elements_excluded() {
        let stamped = format!(
            r#"<Invoice xmlns="{INV}" xmlns:cac="{CAC}" xmlns:cbc="{CBC}">
  <ext:UBLExtensions xmlns:ext="urn:ext"><ext:Any>x</ext:Any></ext:UBLExtensions>
  <cbc:ID>INV-1</cbc:ID>
  <cac:AdditionalDocumentReference><cbc:ID>ORDER-9</cbc:ID></cac:AdditionalDocumentReference>
  <cac:AdditionalDocumentReference><cbc:ID>QR</cbc:ID><cbc:Data>abc</cbc:Data></cac:AdditionalDocumentReference>
  <cac:AdditionalDocumentReference><cbc:ID> ICV </cbc:ID><cbc:UUID>4</cbc:UUID></cac:AdditionalDocumentReference>
  <cac:Signature><cbc:ID>sig</cbc:ID></cac:Signature>
</Invoice>"#
        );
        let plain = format!(
            r#"<Invoice xmlns="{INV}" xmlns:cac="{CAC}" xmlns:cbc="{CBC}"><cbc:ID>INV-1</cbc:ID><cac:AdditionalDocumentReference><cbc:ID>ORDER-9</cbc:ID></cac:AdditionalDocumentReference></Invoice>"#
        );
        assert_eq!(c14n(&stamped), c14n(&plain));
        assert!(c14n(&plain).contains("ORDER-9"));
    }

    #[test]
    fn test_signature_matched_regardless_of_namespace() {
        let rules = ExclusionRules::default();
        let a = Element::qualified(Some("ds"), "http://www.w3.org/2000/09/xmldsig#", "Signature");
        let b = Element::new("Signature");
        assert!(rules.excludes(&a));
        assert!(rules.excludes(&b));
        assert!(!rules.excludes(&Element::new("SignatureInformation")));
    }

    #[test]
    fn test_strip_is_pure() {
        let root = Element::new("a").child(Element::new("Signature")).child(Element::new("b"));
        let stripped = strip_stamp(&root, &ExclusionRules::default());
        assert_eq!(root.elements().count(), 2);
        assert_eq!(stripped.elements().count(), 1);
    }

    #[test]
    fn test_escaping() {
        let out = c14n("<a t=\"x&#10;&lt;&quot;\">1 &gt; 0 &amp;&#13;</a>");
        assert_eq!(out, "<a t=\"x&#xA;&lt;&quot;\">1 &gt; 0 &amp;&#xD;</a>");
    }

    #[test]
    fn test_default_namespace_undeclared_for_unqualified_child() {
        let root = Element::qualified(None, INV, "Invoice").child(Element::new("Plain"));
        let bytes = canonicalize(&StructuredDocument::new(root), &ExclusionRules::default()).unwrap();
        assert_eq!(
            String::from_utf8(bytes.into_vec()).unwrap(),
            format!(r#"<Invoice xmlns="{INV}"><Plain xmlns=""></Plain></Invoice>"#)
        );
    }

    #[test]
    fn test_prefix_without_namespace_is_malformed() {
        let mut root = Element::new("a");
        root.name.prefix = Some("p".into());
        let err = canonicalize(&StructuredDocument::new(root), &ExclusionRules::default()).unwrap_err();
        assert!(matches!(err, CoreError::MalformedDocument { .. }));
    }
}
