#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for the Skeppsbron EBICS engine.
//!
//! Implements Canonical XML 1.0 (inclusive), with and without comments,
//! over full documents and document subsets.  EBICS H004 pins its
//! signatures to inclusive C14N 1.0 without comments
//! (`http://www.w3.org/TR/2001/REC-xml-c14n-20010315`), applied to the
//! node-set selected by `//*[@authenticate='true']`.

pub mod engine;
pub mod output;

use skeppsbron_core::Error;
use skeppsbron_xml::NodeSet;

/// Canonicalize an XML document.
///
/// - `xml`: the raw XML text
/// - `with_comments`: whether comment nodes are preserved
/// - `node_set`: optional node set (for document-subset canonicalization)
pub fn canonicalize(
    xml: &str,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let doc =
        roxmltree::Document::parse(xml).map_err(|e| Error::XmlParse(e.to_string()))?;
    engine::canonicalize(&doc, with_comments, node_set)
}

/// Convenience: canonicalize with a pre-parsed document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    engine::canonicalize(doc, with_comments, node_set)
}
