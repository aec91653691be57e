#![forbid(unsafe_code)]

//! XML document wrapper over roxmltree.

use skeppsbron_core::Error;

/// An owned XML document.  Stores the raw text; the parsed tree borrows
/// from it.
///
/// To work with the parsed tree, call [`XmlDocument::parse_doc`] which
/// returns a temporary `roxmltree::Document` borrowing from the text.
pub struct XmlDocument {
    text: String,
}

impl XmlDocument {
    /// Parse and validate XML from a string, taking ownership.
    pub fn parse(text: String) -> Result<Self, Error> {
        // Validate that the XML parses successfully.
        let _doc =
            roxmltree::Document::parse(&text).map_err(|e| Error::XmlParse(e.to_string()))?;
        Ok(Self { text })
    }

    /// Parse and validate XML from bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?
            .to_owned();
        Self::parse(text)
    }

    /// Get the raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse the document and return a temporary `roxmltree::Document`.
    ///
    /// This re-parses the XML from the stored text.  For performance,
    /// call this once at the top of a processing pipeline and pass the
    /// resulting document reference down through the call chain.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>, Error> {
        roxmltree::Document::parse(&self.text).map_err(|e| Error::XmlParse(e.to_string()))
    }
}

/// Find the first descendant element with the given local name and namespace.
pub fn find_element<'a>(
    doc: &'a roxmltree::Document<'a>,
    ns: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    doc.descendants().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns
    })
}

/// Find all descendant elements with the given local name and namespace.
pub fn find_elements<'a>(
    doc: &'a roxmltree::Document<'a>,
    ns: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'a>> {
    doc.descendants()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns
        })
        .collect()
}

/// Find the first child element with the given local name and namespace.
pub fn find_child<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    parent.children().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns
    })
}

/// Find a child element, or fail with `MissingElement`.
pub fn require_child<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns: &str,
    local_name: &str,
) -> Result<roxmltree::Node<'a, 'a>, Error> {
    find_child(parent, ns, local_name)
        .ok_or_else(|| Error::MissingElement(local_name.to_owned()))
}

/// Trimmed text content of an element, or the empty string.
pub fn text_of(node: roxmltree::Node<'_, '_>) -> String {
    node.text().unwrap_or("").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(XmlDocument::parse("<open>".into()).is_err());
        assert!(XmlDocument::parse_bytes(b"\xff\xfe").is_err());
    }

    #[test]
    fn test_find_by_namespace() {
        let doc = XmlDocument::parse(
            r#"<root xmlns="urn:a" xmlns:b="urn:b"><x/><b:x/></root>"#.into(),
        )
        .unwrap();
        let parsed = doc.parse_doc().unwrap();
        assert!(find_element(&parsed, "urn:a", "x").is_some());
        assert!(find_element(&parsed, "urn:b", "x").is_some());
        assert!(find_element(&parsed, "urn:c", "x").is_none());
    }

    #[test]
    fn test_require_child_missing() {
        let doc = XmlDocument::parse(r#"<root xmlns="urn:a"><x/></root>"#.into()).unwrap();
        let parsed = doc.parse_doc().unwrap();
        let root = parsed.root_element();
        assert!(require_child(root, "urn:a", "x").is_ok());
        assert!(matches!(
            require_child(root, "urn:a", "y"),
            Err(Error::MissingElement(_))
        ));
    }
}
