#![forbid(unsafe_code)]

//! EBICS response parsing.
//!
//! Responses to signed requests are verified against the bank's
//! authentication key before any field is trusted; key-management
//! responses (INI/HIA/HPB) are not signed, because they may predate the
//! bank key exchange.  Parsers separate three outcomes a caller must
//! distinguish: a reply that cannot be understood, a reply that failed
//! authentication, and a well-formed reply carrying an error code.

use base64::Engine;
use rsa::RsaPublicKey;
use skeppsbron_core::{ns, Error};
use skeppsbron_xml::document::{find_child, require_child, text_of};

use crate::retcode::EbicsReturnCode;
use crate::subscriber::EbicsSubscriberState;
use crate::{order, validate};

/// Encryption parameters of a download: the RSA-encrypted transaction
/// key and the digest identifying which customer key unwraps it.
#[derive(Debug, Clone)]
pub struct DataEncryptionInfo {
    pub transaction_key: Vec<u8>,
    pub bank_pub_digest: Vec<u8>,
}

/// Fields extracted from an `ebicsResponse`.
#[derive(Debug, Clone)]
pub struct EbicsResponseContent {
    pub transaction_id: Option<String>,
    pub data_encryption_info: Option<DataEncryptionInfo>,
    pub order_data_enc_chunk: Option<String>,
    pub technical_return_code: EbicsReturnCode,
    pub bank_return_code: EbicsReturnCode,
    pub segment_number: Option<u32>,
    /// Only present in the initialization phase.
    pub num_segments: Option<u32>,
}

/// Fields extracted from an `ebicsKeyManagementResponse`.
#[derive(Debug, Clone)]
pub struct KeyManagementResponseContent {
    pub technical_return_code: EbicsReturnCode,
    pub bank_return_code: EbicsReturnCode,
    pub order_data: Option<Vec<u8>>,
}

/// Bank keys delivered by an HPB order.
pub struct HpbResponseData {
    pub host_id: String,
    pub authentication_pub_key: RsaPublicKey,
    pub authentication_version: String,
    pub encryption_pub_key: RsaPublicKey,
    pub encryption_version: String,
}

/// One protocol version advertised in a HEV response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevVersionSpec {
    pub protocol: String,
    pub version: String,
}

/// Parsed HEV response.
#[derive(Debug, Clone)]
pub struct HevDetails {
    pub return_code: String,
    pub report_text: String,
    pub versions: Vec<HevVersionSpec>,
}

/// Parse an `ebicsResponse`, verifying the bank's signature first.
pub fn parse_and_validate_response(
    subscriber: &EbicsSubscriberState,
    xml: &str,
) -> Result<EbicsResponseContent, Error> {
    let bank_auth_pub = subscriber.bank_auth_pub.as_ref().ok_or_else(|| {
        Error::KeyState("bank authentication key missing, request HPB first".into())
    })?;
    skeppsbron_dsig::verify_document(xml, bank_auth_pub)?;

    if let Err(e) = validate::validate_incoming(xml) {
        // Inbound schema checking is a soft gate.
        tracing::warn!(error = %e, "incoming response failed structural validation");
    }

    let doc = roxmltree::Document::parse(xml).map_err(|e| Error::XmlParse(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != ns::node::EBICS_RESPONSE {
        return Err(Error::XmlStructure(format!(
            "expected ebicsResponse, got {}",
            root.tag_name().name()
        )));
    }

    let header = require_child(root, ns::EBICS_H004, ns::node::HEADER)?;
    let static_header = require_child(header, ns::EBICS_H004, ns::node::STATIC)?;
    let mutable = require_child(header, ns::EBICS_H004, ns::node::MUTABLE)?;
    let body = require_child(root, ns::EBICS_H004, ns::node::BODY)?;

    let technical_return_code = EbicsReturnCode::lookup(&text_of(require_child(
        mutable,
        ns::EBICS_H004,
        ns::node::RETURN_CODE,
    )?))?;
    let bank_return_code = EbicsReturnCode::lookup(&text_of(require_child(
        body,
        ns::EBICS_H004,
        ns::node::RETURN_CODE,
    )?))?;

    let transaction_id = find_child(static_header, ns::EBICS_H004, ns::node::TRANSACTION_ID)
        .map(text_of)
        .filter(|t| !t.is_empty());
    let num_segments = parse_opt_u32(
        find_child(static_header, ns::EBICS_H004, ns::node::NUM_SEGMENTS).map(text_of),
        ns::node::NUM_SEGMENTS,
    )?;
    let segment_number = parse_opt_u32(
        find_child(mutable, ns::EBICS_H004, ns::node::SEGMENT_NUMBER).map(text_of),
        ns::node::SEGMENT_NUMBER,
    )?;

    let data_transfer = find_child(body, ns::EBICS_H004, ns::node::DATA_TRANSFER);
    let (data_encryption_info, order_data_enc_chunk) = match data_transfer {
        None => (None, None),
        Some(dt) => {
            let dei = find_child(dt, ns::EBICS_H004, ns::node::DATA_ENCRYPTION_INFO)
                .map(|node| parse_data_encryption_info(node))
                .transpose()?;
            let chunk = find_child(dt, ns::EBICS_H004, ns::node::ORDER_DATA).map(text_of);
            (dei, chunk)
        }
    };

    Ok(EbicsResponseContent {
        transaction_id,
        data_encryption_info,
        order_data_enc_chunk,
        technical_return_code,
        bank_return_code,
        segment_number,
        num_segments,
    })
}

/// Parse an `ebicsKeyManagementResponse`; when the body carries order
/// data (HPB), decrypt and inflate it with the customer keys.
pub fn parse_key_management_response(
    subscriber: &EbicsSubscriberState,
    xml: &str,
) -> Result<KeyManagementResponseContent, Error> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| Error::XmlParse(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != ns::node::EBICS_KEY_MANAGEMENT_RESPONSE {
        return Err(Error::XmlStructure(format!(
            "expected ebicsKeyManagementResponse, got {}",
            root.tag_name().name()
        )));
    }

    let header = require_child(root, ns::EBICS_H004, ns::node::HEADER)?;
    let mutable = require_child(header, ns::EBICS_H004, ns::node::MUTABLE)?;
    let body = require_child(root, ns::EBICS_H004, ns::node::BODY)?;

    let technical_return_code = EbicsReturnCode::lookup(&text_of(require_child(
        mutable,
        ns::EBICS_H004,
        ns::node::RETURN_CODE,
    )?))?;
    let bank_return_code = EbicsReturnCode::lookup(&text_of(require_child(
        body,
        ns::EBICS_H004,
        ns::node::RETURN_CODE,
    )?))?;

    let order_data = match find_child(body, ns::EBICS_H004, ns::node::DATA_TRANSFER) {
        None => None,
        Some(dt) => {
            let dei_node = require_child(dt, ns::EBICS_H004, ns::node::DATA_ENCRYPTION_INFO)?;
            let dei = parse_data_encryption_info(dei_node)?;
            let chunk = text_of(require_child(dt, ns::EBICS_H004, ns::node::ORDER_DATA)?);
            Some(decrypt_and_decompress(subscriber, &dei, &[chunk])?)
        }
    };

    Ok(KeyManagementResponseContent {
        technical_return_code,
        bank_return_code,
        order_data,
    })
}

/// Parse the HPB order data document into the bank's public keys.
pub fn parse_hpb_order_data(order_data: &[u8]) -> Result<HpbResponseData, Error> {
    let text = std::str::from_utf8(order_data)
        .map_err(|e| Error::XmlParse(format!("HPB order data is not UTF-8: {e}")))?;
    let doc = roxmltree::Document::parse(text).map_err(|e| Error::XmlParse(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != ns::node::HPB_RESPONSE_ORDER_DATA {
        return Err(Error::XmlStructure(format!(
            "expected HPBResponseOrderData, got {}",
            root.tag_name().name()
        )));
    }

    let auth_info = require_child(root, ns::EBICS_H004, ns::node::AUTHENTICATION_PUB_KEY_INFO)?;
    let enc_info = require_child(root, ns::EBICS_H004, ns::node::ENCRYPTION_PUB_KEY_INFO)?;
    let host_id = text_of(require_child(root, ns::EBICS_H004, ns::node::HOST_ID)?);

    Ok(HpbResponseData {
        host_id,
        authentication_pub_key: parse_rsa_pub_key(auth_info)?,
        authentication_version: text_of(require_child(
            auth_info,
            ns::EBICS_H004,
            ns::node::AUTHENTICATION_VERSION,
        )?),
        encryption_pub_key: parse_rsa_pub_key(enc_info)?,
        encryption_version: text_of(require_child(
            enc_info,
            ns::EBICS_H004,
            ns::node::ENCRYPTION_VERSION,
        )?),
    })
}

/// Parse an `ebicsHEVResponse`.
pub fn parse_hev_response(xml: &str) -> Result<HevDetails, Error> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| Error::XmlParse(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != ns::node::EBICS_HEV_RESPONSE {
        return Err(Error::XmlStructure(format!(
            "expected ebicsHEVResponse, got {}",
            root.tag_name().name()
        )));
    }

    let src = require_child(root, ns::EBICS_H000, ns::node::SYSTEM_RETURN_CODE)?;
    let return_code = text_of(require_child(src, ns::EBICS_H000, ns::node::RETURN_CODE)?);
    let report_text = text_of(require_child(src, ns::EBICS_H000, ns::node::REPORT_TEXT)?);

    let versions = root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == ns::node::VERSION_NUMBER)
        .map(|n| HevVersionSpec {
            protocol: n
                .attribute(ns::attr::PROTOCOL_VERSION)
                .unwrap_or_default()
                .to_owned(),
            version: text_of(n),
        })
        .collect();

    Ok(HevDetails { return_code, report_text, versions })
}

/// Reassemble, decrypt and inflate downloaded order data.
///
/// Chunks must be passed in delivery order: segment 1 from the init
/// response, segments 2..=N from the transfer responses.  A missing or
/// reordered segment corrupts the CBC stream and fails the inflate.
pub fn decrypt_and_decompress(
    subscriber: &EbicsSubscriberState,
    encryption_info: &DataEncryptionInfo,
    chunks: &[String],
) -> Result<Vec<u8>, Error> {
    let private_key = subscriber.decryption_key_for(&encryption_info.bank_pub_digest)?;
    let joined: String = chunks.concat();
    let ciphertext = base64::engine::general_purpose::STANDARD
        .decode(joined.trim())
        .map_err(|e| Error::Base64(format!("order data: {e}")))?;
    let compressed = skeppsbron_crypto::e002::decrypt_e002(
        &encryption_info.transaction_key,
        &ciphertext,
        private_key,
    )?;
    order::decode_order_data(&compressed)
}

fn parse_data_encryption_info(
    node: roxmltree::Node<'_, '_>,
) -> Result<DataEncryptionInfo, Error> {
    let b64 = base64::engine::general_purpose::STANDARD;
    let digest = text_of(require_child(
        node,
        ns::EBICS_H004,
        ns::node::ENCRYPTION_PUB_KEY_DIGEST,
    )?);
    let key = text_of(require_child(node, ns::EBICS_H004, ns::node::TRANSACTION_KEY)?);
    Ok(DataEncryptionInfo {
        transaction_key: b64
            .decode(key)
            .map_err(|e| Error::Base64(format!("TransactionKey: {e}")))?,
        bank_pub_digest: b64
            .decode(digest)
            .map_err(|e| Error::Base64(format!("EncryptionPubKeyDigest: {e}")))?,
    })
}

fn parse_rsa_pub_key(info: roxmltree::Node<'_, '_>) -> Result<RsaPublicKey, Error> {
    let b64 = base64::engine::general_purpose::STANDARD;
    let pub_key_value = require_child(info, ns::EBICS_H004, ns::node::PUB_KEY_VALUE)?;
    let rsa_value = require_child(pub_key_value, ns::DSIG, ns::node::RSA_KEY_VALUE)?;
    let modulus = b64
        .decode(text_of(require_child(rsa_value, ns::DSIG, ns::node::RSA_MODULUS)?))
        .map_err(|e| Error::Base64(format!("Modulus: {e}")))?;
    let exponent = b64
        .decode(text_of(require_child(rsa_value, ns::DSIG, ns::node::RSA_EXPONENT)?))
        .map_err(|e| Error::Base64(format!("Exponent: {e}")))?;
    skeppsbron_crypto::keys::load_rsa_public_from_components(&modulus, &exponent)
}

fn parse_opt_u32(value: Option<String>, field: &str) -> Result<Option<u32>, Error> {
    match value {
        None => Ok(None),
        Some(t) if t.is_empty() => Ok(None),
        Some(t) => t
            .parse::<u32>()
            .map(Some)
            .map_err(|_| Error::XmlStructure(format!("{field} is not a number: {t}"))),
    }
}
