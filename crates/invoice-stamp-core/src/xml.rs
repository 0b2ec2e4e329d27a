//! XML text to and from [`StructuredDocument`].
//!
//! Parsing resolves every prefix against the declarations in scope, so the
//! resulting tree carries namespace URIs rather than raw prefixes. Comments,
//! processing instructions and the XML declaration are dropped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::document::{Attribute, Element, Name, NamespaceDecl, Node, StructuredDocument};
use crate::error::{CoreError, Result};

/// The namespace permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

impl StructuredDocument {
    /// Parse XML text into a document tree.
    pub fn parse(xml: &str) -> Result<Self> {
        parse_document(xml)
    }

    /// Serialize the document, including an XML declaration.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let mut scope = NamespaceScope::default();
        write_element(&mut out, self.root(), &mut scope);
        out
    }
}

/// Parse XML text into a document tree.
pub fn parse_document(xml: &str) -> Result<StructuredDocument> {
    let mut reader = Reader::from_str(xml);
    let mut scope = NamespaceScope::default();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            CoreError::malformed("parse", format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(start) => {
                let element = open_element(&start, &mut scope)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, &mut scope)?;
                scope.pop();
                close_element(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| CoreError::malformed("parse", "unexpected end tag"))?;
                scope.pop();
                close_element(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| CoreError::malformed("text", e.to_string()))?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| CoreError::malformed("cdata", e.to_string()))?;
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(CoreError::malformed(
            "parse",
            format!("{} unclosed element(s)", stack.len()),
        ));
    }

    root.map(StructuredDocument::new)
        .ok_or_else(|| CoreError::malformed("parse", "no root element"))
}

fn open_element(start: &BytesStart<'_>, scope: &mut NamespaceScope) -> Result<Element> {
    let mut declarations = Vec::new();
    let mut raw_attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| CoreError::malformed("attribute", e.to_string()))?;
        let key = utf8(attr.key.as_ref(), "attribute name")?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| CoreError::malformed("attribute", e.to_string()))?
            .into_owned();

        if key == "xmlns" {
            declarations.push(NamespaceDecl { prefix: None, uri: value });
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push(NamespaceDecl {
                prefix: Some(prefix.to_string()),
                uri: value,
            });
        } else {
            raw_attributes.push((key, value));
        }
    }

    scope.push(declarations.clone());

    let qname = utf8(start.name().as_ref(), "element name")?.to_string();
    let (prefix, local) = split_qname(&qname);
    let namespace = scope.resolve(prefix);
    if prefix.is_some() && namespace.is_none() {
        return Err(CoreError::malformed(
            "namespace",
            format!("unbound prefix on element {}", qname),
        ));
    }

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let (attr_prefix, attr_local) = split_qname(&key);
        // Unprefixed attributes never take the default namespace.
        let attr_namespace = match attr_prefix {
            None => None,
            Some(_) => Some(scope.resolve(attr_prefix).ok_or_else(|| {
                CoreError::malformed("namespace", format!("unbound prefix on attribute {}", key))
            })?),
        };
        attributes.push(Attribute {
            name: Name {
                prefix: attr_prefix.map(str::to_string),
                local: attr_local.to_string(),
                namespace: attr_namespace,
            },
            value,
        });
    }

    Ok(Element {
        name: Name {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
            namespace,
        },
        namespaces: declarations,
        attributes,
        children: Vec::new(),
    })
}

fn close_element(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(CoreError::malformed("parse", "multiple root elements")),
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<()> {
    let Some(parent) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(CoreError::malformed("parse", "text outside the root element"));
    };
    // Adjacent text and CDATA sections merge into one node.
    if let Some(Node::Text(existing)) = parent.children.last_mut() {
        existing.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
    Ok(())
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| CoreError::malformed(what, e.to_string()))
}

/// Split `prefix:local` into its parts.
pub(crate) fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Stack of namespace declarations, innermost last.
#[derive(Debug, Default, Clone)]
pub(crate) struct NamespaceScope {
    frames: Vec<Vec<NamespaceDecl>>,
}

impl NamespaceScope {
    pub(crate) fn push(&mut self, frame: Vec<NamespaceDecl>) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    /// Resolve a prefix (`None` = default namespace). An empty default
    /// declaration resolves to no namespace.
    pub(crate) fn resolve(&self, prefix: Option<&str>) -> Option<String> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE.to_string());
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|decl| decl.prefix.as_deref() == prefix)
            .and_then(|decl| (!decl.uri.is_empty()).then(|| decl.uri.clone()))
    }
}

/// Declarations an element needs so its own name and attribute names
/// resolve to the namespaces they carry.
fn required_declarations(element: &Element) -> Vec<NamespaceDecl> {
    let mut needed = vec![NamespaceDecl {
        prefix: element.name.prefix.clone(),
        uri: element.name.namespace.clone().unwrap_or_default(),
    }];
    for attr in &element.attributes {
        if let (Some(prefix), Some(ns)) = (&attr.name.prefix, &attr.name.namespace) {
            if prefix != "xml" {
                needed.push(NamespaceDecl {
                    prefix: Some(prefix.clone()),
                    uri: ns.clone(),
                });
            }
        }
    }
    needed
}

fn write_element(out: &mut String, element: &Element, scope: &mut NamespaceScope) {
    let mut rendered = element.namespaces.clone();
    let mut frame_view = scope.clone();
    frame_view.push(rendered.clone());

    for need in required_declarations(element) {
        let bound = frame_view.resolve(need.prefix.as_deref()).unwrap_or_default();
        if bound != need.uri {
            rendered.retain(|d| d.prefix != need.prefix);
            rendered.push(need);
            frame_view.pop();
            frame_view.push(rendered.clone());
        }
    }

    out.push('<');
    out.push_str(&element.name.qualified_text());
    for decl in &rendered {
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
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name.qualified_text());
        out.push_str("=\"");
        escape_attribute(out, &attr.value);
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    scope.push(rendered);
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(out, e, scope),
            Node::Text(t) => escape_text(out, t),
        }
    }
    scope.pop();

    out.push_str("</");
    out.push_str(&element.name.qualified_text());
    out.push('>');
}

/// Escape character data.
pub(crate) fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

/// Escape an attribute value.
pub(crate) fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

    #[test]
    fn test_parse_resolves_namespaces() {
        let xml = format!(
            r#"<?xml version="1.0"?>
<!-- leading comment -->
<Invoice xmlns="{}" xmlns:cbc="{}">
  <cbc:ID>INV-1</cbc:ID>
  <Note lang="en">a &amp; b</Note>
</Invoice>"#,
            INVOICE_NS, CBC
        );
        let doc = StructuredDocument::parse(&xml).unwrap();
        let root = doc.root();
        assert_eq!(root.namespace(), Some(INVOICE_NS));
        assert_eq!(root.namespaces.len(), 2);

        let id = root.first_child("ID").unwrap();
        assert_eq!(id.namespace(), Some(CBC));
        assert_eq!(id.name.prefix.as_deref(), Some("cbc"));
        assert_eq!(id.text_content(), "INV-1");

        let note = root.first_child("Note").unwrap();
        assert_eq!(note.namespace(), Some(INVOICE_NS));
        assert_eq!(note.attribute("lang"), Some("en"));
        assert_eq!(note.attributes[0].name.namespace, None);
        assert_eq!(note.text_content(), "a & b");
    }

    #[test]
    fn test_parse_cdata_merges_with_text() {
        let doc = StructuredDocument::parse("<a>x<![CDATA[<y>]]>z</a>").unwrap();
        assert_eq!(doc.root().children.len(), 1);
        assert_eq!(doc.root().text_content(), "x<y>z");
    }

    #[test]
    fn test_parse_rejects_unbound_prefix() {
        let err = StructuredDocument::parse("<cbc:ID>1</cbc:ID>").unwrap_err();
        assert!(matches!(err, CoreError::MalformedDocument { .. }));
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(StructuredDocument::parse("<a><b></a>").is_err());
        assert!(StructuredDocument::parse("<a>").is_err());
        assert!(StructuredDocument::parse("").is_err());
    }

    #[test]
    fn test_serialize_adds_missing_declarations() {
        let root = Element::qualified(None, INVOICE_NS, "Invoice")
            .child(Element::qualified(Some("cbc"), CBC, "ID").text("1"));
        let xml = StructuredDocument::new(root).to_xml_string();
        assert!(xml.contains(&format!("<Invoice xmlns=\"{}\">", INVOICE_NS)));
        assert!(xml.contains(&format!("<cbc:ID xmlns:cbc=\"{}\">1</cbc:ID>", CBC)));
    }

    #[test]
    fn test_serialize_then_parse_preserves_tree() {
        let xml = format!(
            r#"<Invoice xmlns="{}" xmlns:cbc="{}"><cbc:ID schemeID="x&quot;y">1 &lt; 2</cbc:ID><Empty/></Invoice>"#,
            INVOICE_NS, CBC
        );
        let doc = StructuredDocument::parse(&xml).unwrap();
        let reparsed = StructuredDocument::parse(&doc.to_xml_string()).unwrap();
        assert_eq!(doc, reparsed);
    }
}
