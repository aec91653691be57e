#![forbid(unsafe_code)]

//! Structural validation of EBICS documents.
//!
//! Checks the element sequences the H004 schema fixes, per message
//! kind.  Outbound validation is a hard gate before transmission;
//! inbound validation is soft (callers log and continue), since the
//! signature check is what actually protects the content.

use skeppsbron_core::{ns, Error};

/// The schema sequence of the request static header.  Observed children
/// must be a subsequence of this list.
const STATIC_HEADER_SEQUENCE: &[&str] = &[
    ns::node::HOST_ID,
    ns::node::NONCE,
    ns::node::TIMESTAMP,
    ns::node::PARTNER_ID,
    ns::node::USER_ID,
    ns::node::SYSTEM_ID,
    ns::node::PRODUCT,
    ns::node::ORDER_DETAILS,
    ns::node::BANK_PUB_KEY_DIGESTS,
    ns::node::SECURITY_MEDIUM,
    ns::node::NUM_SEGMENTS,
    ns::node::TRANSACTION_ID,
];

/// Validate a document we are about to send.
pub fn validate_outgoing(xml: &str) -> Result<(), Error> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::Validation(format!("unparseable outgoing document: {e}")))?;
    let root = doc.root_element();
    match root.tag_name().name() {
        ns::node::EBICS_REQUEST => validate_request(root, true),
        ns::node::EBICS_NO_PUB_KEY_DIGESTS_REQUEST => validate_request(root, true),
        ns::node::EBICS_UNSECURED_REQUEST => validate_request(root, false),
        ns::node::EBICS_HEV_REQUEST => validate_hev_request(root),
        other => Err(Error::Validation(format!("unknown request root: {other}"))),
    }
}

/// Validate a received document.  Failures here are reported by the
/// caller as warnings, not errors.
pub fn validate_incoming(xml: &str) -> Result<(), Error> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::Validation(format!("unparseable incoming document: {e}")))?;
    let root = doc.root_element();
    match root.tag_name().name() {
        ns::node::EBICS_RESPONSE | ns::node::EBICS_KEY_MANAGEMENT_RESPONSE => {
            let children = element_names(root);
            require(children.contains(&ns::node::HEADER.to_owned()), "header missing")?;
            require(children.contains(&ns::node::BODY.to_owned()), "body missing")?;
            Ok(())
        }
        ns::node::EBICS_HEV_RESPONSE => {
            let children = element_names(root);
            require(
                children.contains(&ns::node::SYSTEM_RETURN_CODE.to_owned()),
                "SystemReturnCode missing",
            )
        }
        other => Err(Error::Validation(format!("unknown response root: {other}"))),
    }
}

fn validate_request(root: roxmltree::Node<'_, '_>, secured: bool) -> Result<(), Error> {
    require(
        root.attribute(ns::attr::VERSION) == Some("H004"),
        "Version attribute must be H004",
    )?;
    let children = element_names(root);
    let expected: Vec<&str> = if secured {
        vec![ns::node::HEADER, ns::node::AUTH_SIGNATURE, ns::node::BODY]
    } else {
        vec![ns::node::HEADER, ns::node::BODY]
    };
    require(
        names_equal(&children, &expected),
        &format!("root children must be {expected:?}, got {children:?}"),
    )?;

    let header = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == ns::node::HEADER)
        .ok_or_else(|| Error::Validation("header missing".into()))?;
    require(
        header.attribute(ns::attr::AUTHENTICATE) == Some("true"),
        "header must carry authenticate=\"true\"",
    )?;
    let header_children = element_names(header);
    require(
        names_equal(&header_children, &[ns::node::STATIC, ns::node::MUTABLE]),
        "header children must be static, mutable",
    )?;

    let static_header = header
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == ns::node::STATIC)
        .ok_or_else(|| Error::Validation("static header missing".into()))?;
    check_sequence(&element_names(static_header), STATIC_HEADER_SEQUENCE)
}

fn validate_hev_request(root: roxmltree::Node<'_, '_>) -> Result<(), Error> {
    require(
        root.tag_name().namespace() == Some(ns::EBICS_H000),
        "HEV request must use the H000 namespace",
    )?;
    require(
        names_equal(&element_names(root), &[ns::node::HOST_ID]),
        "HEV request must contain exactly HostID",
    )
}

fn names_equal(observed: &[String], expected: &[&str]) -> bool {
    observed.len() == expected.len()
        && observed.iter().zip(expected).all(|(a, b)| a == b)
}

/// Check that observed elements form an in-order subsequence of the
/// schema sequence.
fn check_sequence(observed: &[String], sequence: &[&str]) -> Result<(), Error> {
    let mut cursor = 0usize;
    for name in observed {
        match sequence[cursor..].iter().position(|s| s == name) {
            Some(offset) => cursor += offset + 1,
            None => {
                return Err(Error::Validation(format!(
                    "element {name} out of schema order"
                )))
            }
        }
    }
    Ok(())
}

fn element_names(node: roxmltree::Node<'_, '_>) -> Vec<String> {
    node.children()
        .filter(|n| n.is_element())
        .map(|n| n.tag_name().name().to_owned())
        .collect()
}

fn require(cond: bool, reason: &str) -> Result<(), Error> {
    if cond {
        Ok(())
    } else {
        Err(Error::Validation(reason.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request_passes() {
        let xml = concat!(
            r#"<ebicsRequest xmlns="urn:org:ebics:H004" Version="H004" Revision="1">"#,
            r#"<header authenticate="true">"#,
            r#"<static><HostID>H</HostID><TransactionID>T</TransactionID></static>"#,
            r#"<mutable><TransactionPhase>Transfer</TransactionPhase></mutable>"#,
            r#"</header><AuthSignature/><body/></ebicsRequest>"#
        );
        validate_outgoing(xml).unwrap();
    }

    #[test]
    fn test_out_of_order_static_header_rejected() {
        let xml = concat!(
            r#"<ebicsRequest xmlns="urn:org:ebics:H004" Version="H004" Revision="1">"#,
            r#"<header authenticate="true">"#,
            r#"<static><PartnerID>P</PartnerID><HostID>H</HostID></static>"#,
            r#"<mutable/></header><AuthSignature/><body/></ebicsRequest>"#
        );
        assert!(matches!(validate_outgoing(xml), Err(Error::Validation(_))));
    }

    #[test]
    fn test_missing_auth_signature_rejected() {
        let xml = concat!(
            r#"<ebicsRequest xmlns="urn:org:ebics:H004" Version="H004" Revision="1">"#,
            r#"<header authenticate="true"><static/><mutable/></header><body/></ebicsRequest>"#
        );
        assert!(validate_outgoing(xml).is_err());
    }

    #[test]
    fn test_unknown_root_rejected() {
        assert!(validate_outgoing("<mystery/>").is_err());
        assert!(validate_incoming("<mystery/>").is_err());
    }

    #[test]
    fn test_built_requests_validate() {
        use crate::request;
        use crate::subscriber::{EbicsKeyState, EbicsSubscriberState};
        use skeppsbron_crypto::keys::generate_rsa_keypair;

        let bank = generate_rsa_keypair(2048).unwrap();
        let sub = EbicsSubscriberState {
            ebics_url: "https://bank.example.com/ebicsweb".into(),
            host_id: "HOST01".into(),
            partner_id: "PARTNER1".into(),
            user_id: "USER1".into(),
            system_id: None,
            customer_sign_key: generate_rsa_keypair(2048).unwrap(),
            customer_auth_key: generate_rsa_keypair(2048).unwrap(),
            customer_enc_key: generate_rsa_keypair(2048).unwrap(),
            bank_auth_pub: Some(bank.to_public_key()),
            bank_enc_pub: Some(bank.to_public_key()),
            ini_state: EbicsKeyState::Sent,
            hia_state: EbicsKeyState::Sent,
        };

        validate_outgoing(&request::make_hev_request("HOST01")).unwrap();
        validate_outgoing(&request::make_ini_request(&sub).unwrap()).unwrap();
        validate_outgoing(&request::make_hia_request(&sub).unwrap()).unwrap();
        validate_outgoing(&request::make_hpb_request(&sub).unwrap()).unwrap();
        validate_outgoing(
            &request::make_download_init_request(&sub, "C53", &Default::default()).unwrap(),
        )
        .unwrap();
        validate_outgoing(
            &request::make_download_transfer_request(&sub, "TX", 2, 3).unwrap(),
        )
        .unwrap();
        validate_outgoing(&request::make_download_receipt_request(&sub, "TX").unwrap())
            .unwrap();
    }
}
