//! StructuredDocument: an ordered, namespaced element tree.
//!
//! The tree keeps namespace URIs resolved on every element and attribute, so
//! matching and canonicalization never depend on which prefix a producer
//! happened to pick. Declarations seen while parsing are kept only so the
//! document can be written back out the way it came in.

use serde::{Deserialize, Serialize};

/// A qualified name: optional prefix, local part, resolved namespace URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl Name {
    /// An unqualified name in no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            namespace: None,
        }
    }

    /// A name bound to `namespace`, written with `prefix` (`None` means the
    /// default namespace for elements).
    pub fn qualified(
        prefix: Option<&str>,
        namespace: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// The name as written: `prefix:local` or `local`.
    pub fn qualified_text(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }
}

/// A namespace declaration (`xmlns` or `xmlns:prefix`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

/// An attribute. Namespace declarations are never stored as attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: Name,
    pub value: String,
}

/// A child node of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }
}

/// An element with attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: Name,
    pub namespaces: Vec<NamespaceDecl>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    /// An element in no namespace.
    pub fn new(local: impl Into<String>) -> Self {
        Self::with_name(Name::local(local))
    }

    /// An element bound to a namespace.
    pub fn qualified(
        prefix: Option<&str>,
        namespace: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        Self::with_name(Name::qualified(prefix, namespace, local))
    }

    pub fn with_name(name: Name) -> Self {
        Self {
            name,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder
    // ─────────────────────────────────────────────────────────────────────────

    /// Declare a namespace on this element.
    pub fn declare(mut self, prefix: Option<&str>, uri: impl Into<String>) -> Self {
        self.namespaces.push(NamespaceDecl {
            prefix: prefix.map(str::to_string),
            uri: uri.into(),
        });
        self
    }

    /// Add an unqualified attribute.
    pub fn attr(mut self, local: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(Name::local(local), value);
        self
    }

    /// Add a child element.
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Add a text child.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Set an attribute, replacing any existing one with the same
    /// namespace and local name.
    pub fn set_attribute(&mut self, name: Name, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.name.local == name.local && a.name.namespace == name.namespace)
        {
            existing.value = value;
        } else {
            self.attributes.push(Attribute { name, value });
        }
    }

    /// Append a child element after all existing content.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Remove every direct child element matching `pred`. Returns how many
    /// were removed.
    pub fn remove_children_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&Element) -> bool,
    {
        let before = self.children.len();
        self.children.retain(|node| match node {
            Node::Element(e) => !pred(e),
            Node::Text(_) => true,
        });
        before - self.children.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace.as_deref()
    }

    /// True if the local name matches, whatever the namespace.
    pub fn is(&self, local: &str) -> bool {
        self.name.local == local
    }

    /// Value of the first attribute with this local name.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Direct child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First direct child element with this local name.
    pub fn first_child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(local))
    }

    /// All direct child elements with this local name.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.is(local))
    }

    /// Follow a path of local names, taking the first match at each step.
    pub fn find_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Element> {
        let mut current = self;
        for step in path {
            current = current.first_child(step.as_ref())?;
        }
        Some(current)
    }

    /// Concatenated direct text content.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

/// A structured business document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDocument {
    root: Element,
}

impl StructuredDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    /// Text of the element at `path` below the root, trimmed.
    pub fn text_at<S: AsRef<str>>(&self, path: &[S]) -> Option<String> {
        self.root
            .find_path(path)
            .map(|e| e.text_content().trim().to_string())
    }
}

impl From<Element> for StructuredDocument {
    fn from(root: Element) -> Self {
        Self::new(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

    fn sample() -> Element {
        Element::new("Invoice")
            .child(Element::qualified(Some("cbc"), CBC, "ID").text("INV-1"))
            .child(
                Element::new("Totals")
                    .child(Element::new("Amount").attr("currencyID", "SAR").text(" 115.00 ")),
            )
    }

    #[test]
    fn test_find_path_and_text() {
        let doc = StructuredDocument::new(sample());
        assert_eq!(doc.text_at(&["ID"]), Some("INV-1".to_string()));
        assert_eq!(doc.text_at(&["Totals", "Amount"]), Some("115.00".to_string()));
        assert_eq!(doc.text_at(&["Missing"]), None);
    }

    #[test]
    fn test_matching_ignores_namespace() {
        let root = sample();
        let id = root.first_child("ID").unwrap();
        assert_eq!(id.namespace(), Some(CBC));
        assert!(id.is("ID"));
    }

    #[test]
    fn test_remove_children_where() {
        let mut root = sample();
        let removed = root.remove_children_where(|e| e.is("ID"));
        assert_eq!(removed, 1);
        assert!(root.first_child("ID").is_none());
        assert!(root.first_child("Totals").is_some());
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut e = Element::new("Amount").attr("currencyID", "SAR");
        e.set_attribute(Name::local("currencyID"), "USD");
        assert_eq!(e.attributes.len(), 1);
        assert_eq!(e.attribute("currencyID"), Some("USD"));
    }

    #[test]
    fn test_push_child_appends_last() {
        let mut root = sample();
        root.push_child(Element::new("Stamp"));
        assert_eq!(root.elements().last().unwrap().local_name(), "Stamp");
    }
}
