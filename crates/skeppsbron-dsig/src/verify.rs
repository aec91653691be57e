#![forbid(unsafe_code)]

//! AuthSignature verification.

use base64::Engine;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use signature::Verifier;
use skeppsbron_core::{algorithm, ns, Error};
use skeppsbron_xml::document::{find_child, require_child, text_of};
use skeppsbron_xml::NodeSet;

/// Verify the authentication signature of an EBICS document.
///
/// Errors are classified so callers can tell a reply they could not
/// understand (`XmlParse`/`XmlStructure`/`MissingElement`) from a reply
/// that failed authentication (`DigestMismatch`/`SignatureInvalid`).
pub fn verify_document(xml: &str, public_key: &RsaPublicKey) -> Result<(), Error> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| Error::XmlParse(e.to_string()))?;

    let auth_sig = crate::find_auth_signature(&doc)?;
    let signed_info = require_child(auth_sig, ns::DSIG, ns::node::SIGNED_INFO)?;
    let signature_value = require_child(auth_sig, ns::DSIG, ns::node::SIGNATURE_VALUE)?;

    check_algorithms(signed_info)?;

    let reference = require_child(signed_info, ns::DSIG, ns::node::REFERENCE)?;
    let digest_value = require_child(reference, ns::DSIG, ns::node::DIGEST_VALUE)?;
    let claimed_digest = base64::engine::general_purpose::STANDARD
        .decode(text_of(digest_value))
        .map_err(|e| Error::Base64(format!("DigestValue: {e}")))?;

    // Recompute the digest over the authenticate="true" node-set.
    let node_set = crate::authenticated_node_set(&doc)?;
    let canonical = skeppsbron_c14n::canonicalize_doc(&doc, false, Some(&node_set))?;
    let actual_digest = Sha256::digest(&canonical);
    if actual_digest.as_slice() != claimed_digest.as_slice() {
        return Err(Error::DigestMismatch);
    }

    // Check the RSA signature over the canonicalized SignedInfo.
    let si_set = NodeSet::tree_without_comments(signed_info);
    let si_canonical = skeppsbron_c14n::canonicalize_doc(&doc, false, Some(&si_set))?;
    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(text_of(signature_value))
        .map_err(|e| Error::Base64(format!("SignatureValue: {e}")))?;
    let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes.as_slice())
        .map_err(|e| Error::SignatureInvalid(format!("malformed signature: {e}")))?;
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key.clone());
    verifying_key
        .verify(&si_canonical, &sig)
        .map_err(|_| Error::SignatureInvalid("RSA-SHA256 check failed".into()))
}

/// Require the fixed EBICS algorithm suite before trusting any value.
fn check_algorithms(signed_info: roxmltree::Node<'_, '_>) -> Result<(), Error> {
    let c14n_method =
        require_child(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)?;
    expect_algorithm(c14n_method, algorithm::C14N)?;

    let sig_method = require_child(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)?;
    expect_algorithm(sig_method, algorithm::RSA_SHA256)?;

    let reference = require_child(signed_info, ns::DSIG, ns::node::REFERENCE)?;
    let uri = reference
        .attribute(ns::attr::URI)
        .ok_or_else(|| Error::MissingAttribute("URI on Reference".into()))?;
    if uri != algorithm::AUTHENTICATE_XPOINTER {
        return Err(Error::XmlStructure(format!("unexpected Reference URI: {uri}")));
    }
    let digest_method = require_child(reference, ns::DSIG, ns::node::DIGEST_METHOD)?;
    expect_algorithm(digest_method, algorithm::SHA256)?;

    if let Some(transforms) = find_child(reference, ns::DSIG, ns::node::TRANSFORMS) {
        for t in transforms.children().filter(|n| n.is_element()) {
            expect_algorithm(t, algorithm::C14N)?;
        }
    }
    Ok(())
}

fn expect_algorithm(node: roxmltree::Node<'_, '_>, expected: &str) -> Result<(), Error> {
    let actual = node
        .attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute(format!(
            "Algorithm on {}",
            node.tag_name().name()
        )))?;
    if actual != expected {
        return Err(Error::XmlStructure(format!(
            "unexpected algorithm on {}: {actual}",
            node.tag_name().name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::sign_document;
    use skeppsbron_crypto::keys::generate_rsa_keypair;

    const TWO_ELEMENT_DOC: &str = concat!(
        r#"<myMessage xmlns:ebics="urn:org:ebics:H004">"#,
        r#"<foo authenticate="true">Hello World</foo>"#,
        r#"<bar authenticate="true">Another one!</bar>"#,
        r#"<ebics:AuthSignature/>"#,
        r#"</myMessage>"#
    );

    #[test]
    fn test_sign_then_verify_two_authenticated_elements() {
        let key = generate_rsa_keypair(2048).unwrap();
        let signed = sign_document(TWO_ELEMENT_DOC, &key).unwrap();
        verify_document(&signed, &key.to_public_key()).unwrap();
    }

    #[test]
    fn test_verify_with_other_key_fails() {
        let key = generate_rsa_keypair(2048).unwrap();
        let other = generate_rsa_keypair(2048).unwrap();
        let signed = sign_document(TWO_ELEMENT_DOC, &key).unwrap();
        assert!(matches!(
            verify_document(&signed, &other.to_public_key()),
            Err(Error::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_mutated_authenticated_subtree_fails() {
        let key = generate_rsa_keypair(2048).unwrap();
        let signed = sign_document(TWO_ELEMENT_DOC, &key).unwrap();
        let tampered = signed.replace("Hello World", "Hello Wordl");
        assert!(matches!(
            verify_document(&tampered, &key.to_public_key()),
            Err(Error::DigestMismatch)
        ));
    }

    #[test]
    fn test_unauthenticated_content_is_not_covered() {
        // Mutating content outside authenticate="true" subtrees leaves
        // the signature valid; only authenticated subtrees are covered.
        let key = generate_rsa_keypair(2048).unwrap();
        let xml = concat!(
            r#"<myMessage xmlns:ebics="urn:org:ebics:H004">"#,
            r#"<foo authenticate="true">Hello World</foo>"#,
            r#"<loose>free text</loose>"#,
            r#"<ebics:AuthSignature/>"#,
            r#"</myMessage>"#
        );
        let signed = sign_document(xml, &key).unwrap();
        let mutated = signed.replace("free text", "other text");
        verify_document(&mutated, &key.to_public_key()).unwrap();
    }

    #[test]
    fn test_missing_signature_is_structural_error() {
        let key = generate_rsa_keypair(2048).unwrap();
        let xml = r#"<myMessage><foo authenticate="true">x</foo></myMessage>"#;
        assert!(matches!(
            verify_document(xml, &key.to_public_key()),
            Err(Error::MissingElement(_))
        ));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let key = generate_rsa_keypair(2048).unwrap();
        assert!(matches!(
            verify_document("not xml at all <", &key.to_public_key()),
            Err(Error::XmlParse(_))
        ));
    }
}
