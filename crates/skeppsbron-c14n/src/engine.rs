#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 engine.
//!
//! Per the spec, the canonical form:
//! - Outputs namespace declarations sorted by prefix (default first)
//! - Outputs attributes sorted by (namespace-URI, local-name)
//! - Escapes text and attribute values per C14N rules
//! - Optionally preserves or strips comments
//! - Supports document-subset canonicalization via NodeSet: an element
//!   outside the set contributes nothing itself but its in-set
//!   descendants are still processed.

use crate::output::{self, Attr, NsDecl};
use skeppsbron_core::Error;
use skeppsbron_xml::NodeSet;
use std::collections::BTreeMap;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Canonicalize a parsed document, optionally restricted to a node set.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let ctx = C14nContext { with_comments, node_set };
    let mut output = Vec::new();
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
    fn is_visible(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        match self.node_set {
            None => true,
            Some(set) => set.contains(node),
        }
    }

    fn process_node(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            roxmltree::NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, inherited_ns)?;
                }
            }
            roxmltree::NodeType::Element => {
                self.process_element(node, output, inherited_ns)?;
            }
            roxmltree::NodeType::Text => {
                if self.is_visible(&node) {
                    let text = node.text().unwrap_or("");
                    output.extend_from_slice(output::escape_text(text).as_bytes());
                }
            }
            roxmltree::NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    // Document-level comments get newline separators
                    // relative to the document element.
                    let parent_is_root = node
                        .parent()
                        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);
                    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                    output.extend_from_slice(b"<!--");
                    output.extend_from_slice(node.text().unwrap_or("").as_bytes());
                    output.extend_from_slice(b"-->");
                    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                }
            }
            roxmltree::NodeType::PI => {
                if self.is_visible(&node) {
                    let parent_is_root = node
                        .parent()
                        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);
                    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                    output.extend_from_slice(b"<?");
                    output.extend_from_slice(node.tag_name().name().as_bytes());
                    if let Some(value) = node.text() {
                        if !value.is_empty() {
                            output.push(b' ');
                            output.extend_from_slice(output::escape_pi(value).as_bytes());
                        }
                    }
                    output.extend_from_slice(b"?>");
                    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // Not in the subset: the element renders nothing, and its
            // children inherit the namespace context of the nearest
            // visible ancestor unchanged.
            for child in node.children() {
                self.process_node(child, output, inherited_ns)?;
            }
            return Ok(());
        }

        // All namespace declarations in scope at this element; nearer
        // declarations override farther ones.
        let current_ns = collect_inscope_namespaces(&node);

        // A declaration is rendered when it is new or changed relative
        // to what the nearest rendered ancestor already declared.  The
        // xml prefix is never rendered.
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for (prefix, uri) in &current_ns {
            if prefix == "xml" {
                continue;
            }
            if inherited_ns.get(prefix) != Some(uri) {
                ns_decls.push(NsDecl { prefix: prefix.clone(), uri: uri.clone() });
            }
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = Vec::new();
        for attr in node.attributes() {
            let ns_uri = attr.namespace().unwrap_or("");
            let qname = match attr_prefix(&node, &attr) {
                Some(prefix) => format!("{}:{}", prefix, attr.name()),
                None => attr.name().to_owned(),
            };
            attrs.push(Attr {
                ns_uri: ns_uri.to_owned(),
                local_name: attr.name().to_owned(),
                qualified_name: qname,
                value: attr.value().to_owned(),
            });
        }

        // Document-subset form: a visible element whose parent is not
        // visible inherits the xml:* attributes of its ancestors.
        if self.node_set.is_some() {
            let parent_not_visible = node
                .parent()
                .map_or(true, |p| !p.is_element() || !self.is_visible(&p));
            if parent_not_visible {
                attrs.extend(inherited_xml_attrs(&node, &attrs));
            }
        }
        attrs.sort();

        let elem_name = qualified_element_name(&node);
        output.push(b'<');
        output.extend_from_slice(elem_name.as_bytes());
        for decl in &ns_decls {
            output.extend_from_slice(decl.render().as_bytes());
        }
        for attr in &attrs {
            output.extend_from_slice(attr.render().as_bytes());
        }
        output.push(b'>');

        let mut child_ns = inherited_ns.clone();
        for (prefix, uri) in &current_ns {
            if prefix != "xml" {
                child_ns.insert(prefix.clone(), uri.clone());
            }
        }
        for child in node.children() {
            self.process_node(child, output, &child_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
        Ok(())
    }
}

/// Collect all in-scope namespaces for an element, walking the ancestor
/// chain with closer declarations overriding more distant ones.
fn collect_inscope_namespaces(node: &roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let mut levels: Vec<BTreeMap<String, String>> = Vec::new();
    let mut current = Some(*node);
    while let Some(n) = current {
        if n.is_element() {
            let mut level = BTreeMap::new();
            for ns in n.namespaces() {
                level.insert(ns.name().unwrap_or("").to_owned(), ns.uri().to_owned());
            }
            levels.push(level);
        }
        current = n.parent();
    }

    let mut result = BTreeMap::new();
    for level in levels.into_iter().rev() {
        for (prefix, uri) in level {
            if uri.is_empty() {
                // Un-declaration of the default namespace.
                result.remove(&prefix);
            } else {
                result.insert(prefix, uri);
            }
        }
    }
    result
}

/// xml:* attributes inherited from ancestors when the parent is outside
/// the node set; attributes already present on the element win.
fn inherited_xml_attrs(node: &roxmltree::Node<'_, '_>, existing: &[Attr]) -> Vec<Attr> {
    let mut inherited: BTreeMap<String, String> = BTreeMap::new();
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if ancestor.is_element() {
            for attr in ancestor.attributes() {
                if attr.namespace() == Some(XML_NS) && !inherited.contains_key(attr.name()) {
                    inherited.insert(attr.name().to_owned(), attr.value().to_owned());
                }
            }
        }
        current = ancestor.parent();
    }

    inherited
        .into_iter()
        .filter(|(name, _)| {
            !existing
                .iter()
                .any(|a| a.ns_uri == XML_NS && a.local_name == *name)
        })
        .map(|(name, value)| Attr {
            ns_uri: XML_NS.to_owned(),
            qualified_name: format!("xml:{name}"),
            local_name: name,
            value,
        })
        .collect()
}

fn qualified_element_name(node: &roxmltree::Node<'_, '_>) -> String {
    match node.tag_name().namespace() {
        Some(uri) => match node.lookup_prefix(uri) {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}:{}", prefix, node.tag_name().name())
            }
            _ => node.tag_name().name().to_owned(),
        },
        None => node.tag_name().name().to_owned(),
    }
}

fn attr_prefix(
    node: &roxmltree::Node<'_, '_>,
    attr: &roxmltree::Attribute<'_, '_>,
) -> Option<String> {
    match attr.namespace() {
        Some(XML_NS) => Some("xml".to_owned()),
        Some(uri) => node.lookup_prefix(uri).map(|p| p.to_owned()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, false, None).unwrap()).unwrap()
    }

    #[test]
    fn test_simple_c14n() {
        // Attributes sorted by local name, empty element expanded.
        assert_eq!(c14n(r#"<root><a b="1" a="2"/></root>"#), r#"<root><a a="2" b="1"></a></root>"#);
    }

    #[test]
    fn test_namespace_rendering() {
        let out = c14n(r#"<root xmlns:b="http://b" xmlns:a="http://a"><a:child/></root>"#);
        assert_eq!(
            out,
            r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#
        );
    }

    #[test]
    fn test_inherited_declaration_not_repeated() {
        let out = c14n(r#"<root xmlns="urn:x"><child/></root>"#);
        assert_eq!(out, r#"<root xmlns="urn:x"><child></child></root>"#);
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(
            c14n("<root>a &amp; b &lt; c</root>"),
            "<root>a &amp; b &lt; c</root>"
        );
    }

    #[test]
    fn test_comments_stripped_without_comments() {
        assert_eq!(c14n("<root><!-- hidden --><a/></root>"), "<root><a></a></root>");
    }

    #[test]
    fn test_subset_renders_inherited_namespace() {
        let xml = r#"<root xmlns="urn:x" xmlns:ds="urn:d"><ds:inner><leaf/></ds:inner></root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let inner = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "inner")
            .unwrap();
        let set = skeppsbron_xml::NodeSet::tree_without_comments(inner);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap();
        // The subtree root re-declares the namespaces it inherits.
        assert_eq!(
            out,
            r#"<ds:inner xmlns="urn:x" xmlns:ds="urn:d"><leaf></leaf></ds:inner>"#
        );
    }

    #[test]
    fn test_subset_union_of_disjoint_trees() {
        let xml = r#"<root><a keep="true">x</a><skip/><b keep="true">y</b></root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let mut set = skeppsbron_xml::NodeSet::new();
        for n in doc.descendants() {
            if n.is_element() && n.attribute("keep") == Some("true") {
                set.add_subtree(n);
            }
        }
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap();
        assert_eq!(out, r#"<a keep="true">x</a><b keep="true">y</b>"#);
    }
}
