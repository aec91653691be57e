#![forbid(unsafe_code)]

//! AuthSignature creation.

use base64::Engine;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use signature::{SignatureEncoding, Signer};
use skeppsbron_core::{algorithm, ns, Error};
use skeppsbron_xml::Element;

/// Sign an EBICS document.
///
/// The document must contain an empty `AuthSignature` placeholder and
/// at least one element marked `authenticate="true"`.  Returns the
/// document with the placeholder filled by `ds:SignedInfo` and
/// `ds:SignatureValue`.
pub fn sign_document(xml: &str, private_key: &RsaPrivateKey) -> Result<String, Error> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| Error::XmlParse(e.to_string()))?;

    // Digest the combined authenticate="true" node-set.  The signature
    // block itself carries no authenticate attribute, so inserting it
    // later does not disturb this digest.
    let node_set = crate::authenticated_node_set(&doc)?;
    let canonical = skeppsbron_c14n::canonicalize_doc(&doc, false, Some(&node_set))?;
    let digest_b64 =
        base64::engine::general_purpose::STANDARD.encode(Sha256::digest(&canonical));

    let auth_sig = crate::find_auth_signature(&doc)?;
    if auth_sig.children().any(|c| c.is_element()) {
        return Err(Error::XmlStructure("AuthSignature is not empty".into()));
    }
    let qname = match auth_sig
        .tag_name()
        .namespace()
        .and_then(|uri| auth_sig.lookup_prefix(uri))
        .filter(|prefix| !prefix.is_empty())
    {
        Some(prefix) => format!("{prefix}:{}", ns::node::AUTH_SIGNATURE),
        None => ns::node::AUTH_SIGNATURE.to_owned(),
    };

    let signed_info = signed_info_fragment(&digest_b64);
    let sig_value_placeholder =
        format!("<ds:{sv} xmlns:ds=\"{d}\"></ds:{sv}>", sv = ns::node::SIGNATURE_VALUE, d = ns::DSIG);

    // Splice the signature block into the placeholder's byte range.
    let range = auth_sig.range();
    let mut result = String::with_capacity(xml.len() + signed_info.len() + 256);
    result.push_str(&xml[..range.start]);
    result.push('<');
    result.push_str(&qname);
    result.push('>');
    result.push_str(&signed_info);
    result.push_str(&sig_value_placeholder);
    result.push_str("</");
    result.push_str(&qname);
    result.push('>');
    result.push_str(&xml[range.end..]);

    // Canonicalize SignedInfo in its final document context and sign.
    let updated = roxmltree::Document::parse(&result)
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    let signed_info_node =
        skeppsbron_xml::document::find_element(&updated, ns::DSIG, ns::node::SIGNED_INFO)
            .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;
    let si_set = skeppsbron_xml::NodeSet::tree_without_comments(signed_info_node);
    let si_canonical = skeppsbron_c14n::canonicalize_doc(&updated, false, Some(&si_set))?;

    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(&si_canonical)
        .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))?
        .to_vec();
    let sig_b64 = base64::engine::general_purpose::STANDARD.encode(signature);

    let sig_value_filled = format!(
        "<ds:{sv} xmlns:ds=\"{d}\">{sig_b64}</ds:{sv}>",
        sv = ns::node::SIGNATURE_VALUE,
        d = ns::DSIG
    );
    Ok(result.replacen(&sig_value_placeholder, &sig_value_filled, 1))
}

/// Build the `ds:SignedInfo` fragment with the digest filled in.
fn signed_info_fragment(digest_b64: &str) -> String {
    Element::new("ds:SignedInfo")
        .attr("xmlns:ds", ns::DSIG)
        .child(
            Element::new("ds:CanonicalizationMethod")
                .attr(ns::attr::ALGORITHM, algorithm::C14N),
        )
        .child(
            Element::new("ds:SignatureMethod")
                .attr(ns::attr::ALGORITHM, algorithm::RSA_SHA256),
        )
        .child(
            Element::new("ds:Reference")
                .attr(ns::attr::URI, algorithm::AUTHENTICATE_XPOINTER)
                .child(
                    Element::new("ds:Transforms").child(
                        Element::new("ds:Transform")
                            .attr(ns::attr::ALGORITHM, algorithm::C14N),
                    ),
                )
                .child(
                    Element::new("ds:DigestMethod")
                        .attr(ns::attr::ALGORITHM, algorithm::SHA256),
                )
                .child(Element::new("ds:DigestValue").text(digest_b64)),
        )
        .to_fragment_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skeppsbron_crypto::keys::generate_rsa_keypair;

    #[test]
    fn test_sign_fills_placeholder() {
        let key = generate_rsa_keypair(2048).unwrap();
        let xml = r#"<myMessage><foo authenticate="true">Hello World</foo><AuthSignature/></myMessage>"#;
        let signed = sign_document(xml, &key).unwrap();
        assert!(signed.contains("<ds:SignedInfo"));
        assert!(signed.contains("<ds:SignatureValue"));
        assert!(signed.contains("#xpointer(//*[@authenticate='true'])"));
        // Still parses.
        roxmltree::Document::parse(&signed).unwrap();
    }

    #[test]
    fn test_sign_requires_authenticated_content() {
        let key = generate_rsa_keypair(2048).unwrap();
        let xml = r#"<myMessage><foo>plain</foo><AuthSignature/></myMessage>"#;
        assert!(matches!(
            sign_document(xml, &key),
            Err(Error::MissingElement(_))
        ));
    }

    #[test]
    fn test_sign_requires_placeholder() {
        let key = generate_rsa_keypair(2048).unwrap();
        let xml = r#"<myMessage><foo authenticate="true">x</foo></myMessage>"#;
        assert!(matches!(
            sign_document(xml, &key),
            Err(Error::MissingElement(_))
        ));
    }
}
