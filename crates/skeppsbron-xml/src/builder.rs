#![forbid(unsafe_code)]

//! Ordered XML element tree for building outgoing EBICS documents.
//!
//! EBICS schemas are order-sensitive, so documents are assembled as an
//! explicit tree whose children serialize exactly in insertion order.
//! Serialization is deterministic: the same tree always yields the same
//! bytes, and `parse(serialize(tree))` round-trips structurally.

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
}

/// An XML element with ordered attributes and children.
///
/// The name is the qualified name as written (`"ds:SignedInfo"` or
/// `"header"`); namespace declarations are ordinary attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl Element {
    /// Create a new element with the given qualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute (kept in insertion order).
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Add a child element.
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Add a child element only if present.
    pub fn opt_child(mut self, child: Option<Element>) -> Self {
        if let Some(c) = child {
            self.children.push(XmlNode::Element(c));
        }
        self
    }

    /// Add a text child.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// The qualified element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialize the tree rooted at this element, with XML declaration.
    pub fn to_document_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        self.render(&mut out);
        out
    }

    /// Serialize the tree rooted at this element, without declaration.
    pub fn to_fragment_string(&self) -> String {
        let mut out = String::new();
        self.render(&mut out);
        out
    }

    fn render(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.render(out),
                XmlNode::Text(t) => out.push_str(&escape_text(t)),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Escape text node content.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape attribute values.
fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_keep_insertion_order() {
        let e = Element::new("root")
            .child(Element::new("first"))
            .child(Element::new("second"))
            .child(Element::new("third"));
        assert_eq!(
            e.to_fragment_string(),
            "<root><first/><second/><third/></root>"
        );
    }

    #[test]
    fn test_attr_escaping() {
        let e = Element::new("a").attr("v", "x\"y<z&");
        assert_eq!(e.to_fragment_string(), r#"<a v="x&quot;y&lt;z&amp;"/>"#);
    }

    #[test]
    fn test_text_escaping() {
        let e = Element::new("a").text("1 < 2 & 3");
        assert_eq!(e.to_fragment_string(), "<a>1 &lt; 2 &amp; 3</a>");
    }

    #[test]
    fn test_round_trip_through_parser() {
        let e = Element::new("ebicsRequest")
            .attr("xmlns", "urn:org:ebics:H004")
            .attr("Version", "H004")
            .attr("Revision", "1")
            .child(
                Element::new("header")
                    .attr("authenticate", "true")
                    .child(Element::new("static").child(Element::new("HostID").text("HOST01")))
                    .child(Element::new("mutable")),
            )
            .child(Element::new("AuthSignature"))
            .child(Element::new("body"));
        let serialized = e.to_document_string();
        let doc = roxmltree::Document::parse(&serialized).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().name(), "ebicsRequest");
        assert_eq!(root.attribute("Version"), Some("H004"));
        let names: Vec<&str> = root
            .children()
            .filter(|n| n.is_element())
            .map(|n| n.tag_name().name())
            .collect();
        assert_eq!(names, vec!["header", "AuthSignature", "body"]);
        let host = doc
            .descendants()
            .find(|n| n.tag_name().name() == "HostID")
            .unwrap();
        assert_eq!(host.text(), Some("HOST01"));
        // Serialization is stable.
        assert_eq!(serialized, e.to_document_string());
    }
}
