#![forbid(unsafe_code)]

//! EBICS authentication signatures.
//!
//! Every EBICS H004 envelope carries an `AuthSignature` element holding
//! an XML-DSig signature whose single reference,
//! `#xpointer(//*[@authenticate='true'])`, covers the union of all
//! subtrees marked `authenticate="true"` — one combined reference list,
//! never one signature block per element.  Signing fills the empty
//! placeholder; verification recomputes the digest over the same
//! node-set and checks the RSA-SHA256 signature.

pub mod sign;
pub mod verify;

pub use sign::sign_document;
pub use verify::verify_document;

use skeppsbron_core::Error;
use skeppsbron_xml::NodeSet;

/// Collect the combined node-set of every `authenticate="true"` subtree.
///
/// Fails with `MissingElement` when the document contains none, since a
/// signature over an empty node-set would authenticate nothing.
pub(crate) fn authenticated_node_set(
    doc: &roxmltree::Document<'_>,
) -> Result<NodeSet, Error> {
    let mut set = NodeSet::new();
    for node in doc.descendants() {
        if node.is_element()
            && node.attribute(skeppsbron_core::ns::attr::AUTHENTICATE) == Some("true")
        {
            set.add_subtree(node);
        }
    }
    if set.is_empty() {
        return Err(Error::MissingElement("no authenticate=\"true\" elements".into()));
    }
    Ok(set)
}

/// Find the `AuthSignature` placeholder element, in any namespace.
pub(crate) fn find_auth_signature<'a>(
    doc: &'a roxmltree::Document<'a>,
) -> Result<roxmltree::Node<'a, 'a>, Error> {
    doc.descendants()
        .find(|n| {
            n.is_element() && n.tag_name().name() == skeppsbron_core::ns::node::AUTH_SIGNATURE
        })
        .ok_or_else(|| Error::MissingElement("AuthSignature".into()))
}
