#![forbid(unsafe_code)]

//! EBICS request construction.
//!
//! One function per request kind.  The static header keeps the schema's
//! fixed element order (HostID, Nonce, Timestamp, PartnerID, UserID,
//! SystemID, Product, OrderDetails, BankPubKeyDigests, SecurityMedium,
//! NumSegments, TransactionID) because bank-side parsers validate
//! against the sequence, not just the names.  Requests that carry an
//! `AuthSignature` are signed with the customer authentication key
//! before serialization.

use base64::Engine;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use skeppsbron_core::{algorithm, ns, Error};
use skeppsbron_crypto::a006::{digest_order_a006, sign_a006};
use skeppsbron_crypto::e002::{encrypt_e002, encrypt_e002_with_key};
use skeppsbron_crypto::keys::public_key_hash;
use skeppsbron_xml::Element;

use crate::order;
use crate::subscriber::EbicsSubscriberState;

/// Business parameters of an order.
#[derive(Debug, Clone, Default)]
pub enum OrderParams {
    /// Standard parameters, optionally restricted to a date range.
    #[default]
    Standard,
    /// Standard parameters with an inclusive date range.
    DateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    /// Generic string parameters.
    Generic(Vec<(String, String)>),
}

/// Payload prepared for an upload transaction: the signature envelope
/// and the encrypted, chunked order data, all under one transaction key.
pub struct PreparedUploadData {
    pub encrypted_transaction_key: Vec<u8>,
    pub encrypted_signature_data: Vec<u8>,
    pub encrypted_payload_chunks: Vec<String>,
}

impl PreparedUploadData {
    pub fn num_segments(&self) -> usize {
        self.encrypted_payload_chunks.len()
    }
}

// ── Key management requests ──────────────────────────────────────────

/// Host version query (HEV).  Unsigned, H000 namespace.
pub fn make_hev_request(host_id: &str) -> String {
    Element::new(ns::node::EBICS_HEV_REQUEST)
        .attr("xmlns", ns::EBICS_H000)
        .child(Element::new(ns::node::HOST_ID).text(host_id))
        .to_document_string()
}

/// INI: submit the A006 signature public key.  Unsecured request, no
/// AuthSignature.
pub fn make_ini_request(subscriber: &EbicsSubscriberState) -> Result<String, Error> {
    let order_data = signature_pub_key_order_data(subscriber)?;
    unsecured_request(subscriber, "INI", &order_data)
}

/// HIA: submit the X002 authentication and E002 encryption public keys.
pub fn make_hia_request(subscriber: &EbicsSubscriberState) -> Result<String, Error> {
    let order_data = hia_request_order_data(subscriber)?;
    unsecured_request(subscriber, "HIA", &order_data)
}

/// HPB: fetch the bank's public keys.  Signed, but carries no bank key
/// digests (we do not know them yet).
pub fn make_hpb_request(subscriber: &EbicsSubscriberState) -> Result<String, Error> {
    let static_header = Element::new(ns::node::STATIC)
        .child(Element::new(ns::node::HOST_ID).text(&subscriber.host_id))
        .child(Element::new(ns::node::NONCE).text(order::generate_nonce()))
        .child(Element::new(ns::node::TIMESTAMP).text(order::timestamp_now()))
        .child(Element::new(ns::node::PARTNER_ID).text(&subscriber.partner_id))
        .child(Element::new(ns::node::USER_ID).text(&subscriber.user_id))
        .child(
            Element::new(ns::node::ORDER_DETAILS)
                .child(Element::new(ns::node::ORDER_TYPE).text("HPB"))
                .child(Element::new(ns::node::ORDER_ATTRIBUTE).text("DZHNN")),
        )
        .child(Element::new(ns::node::SECURITY_MEDIUM).text(algorithm::SECURITY_MEDIUM));

    let doc = Element::new(ns::node::EBICS_NO_PUB_KEY_DIGESTS_REQUEST)
        .attr("xmlns", ns::EBICS_H004)
        .attr(ns::attr::VERSION, algorithm::PROTOCOL_VERSION)
        .attr(ns::attr::REVISION, algorithm::PROTOCOL_REVISION)
        .child(
            Element::new(ns::node::HEADER)
                .attr(ns::attr::AUTHENTICATE, "true")
                .child(static_header)
                .child(Element::new(ns::node::MUTABLE)),
        )
        .child(Element::new(ns::node::AUTH_SIGNATURE))
        .child(Element::new(ns::node::BODY))
        .to_document_string();

    skeppsbron_dsig::sign_document(&doc, &subscriber.customer_auth_key)
}

// ── Transaction requests ─────────────────────────────────────────────

/// Initialization request of a download transaction.
pub fn make_download_init_request(
    subscriber: &EbicsSubscriberState,
    order_type: &str,
    order_params: &OrderParams,
) -> Result<String, Error> {
    let (bank_auth_pub, bank_enc_pub) = subscriber.require_bank_keys()?;

    let static_header = Element::new(ns::node::STATIC)
        .child(Element::new(ns::node::HOST_ID).text(&subscriber.host_id))
        .child(Element::new(ns::node::NONCE).text(order::generate_nonce()))
        .child(Element::new(ns::node::TIMESTAMP).text(order::timestamp_now()))
        .child(Element::new(ns::node::PARTNER_ID).text(&subscriber.partner_id))
        .child(Element::new(ns::node::USER_ID).text(&subscriber.user_id))
        .opt_child(
            subscriber
                .system_id
                .as_ref()
                .map(|s| Element::new(ns::node::SYSTEM_ID).text(s)),
        )
        .child(order_details(order_type, "DZHNN", order_params))
        .child(bank_pub_key_digests(bank_auth_pub, bank_enc_pub))
        .child(Element::new(ns::node::SECURITY_MEDIUM).text(algorithm::SECURITY_MEDIUM));

    let doc = ebics_request(
        Element::new(ns::node::HEADER)
            .attr(ns::attr::AUTHENTICATE, "true")
            .child(static_header)
            .child(
                Element::new(ns::node::MUTABLE)
                    .child(Element::new(ns::node::TRANSACTION_PHASE).text("Initialisation")),
            ),
        Element::new(ns::node::BODY),
    );
    skeppsbron_dsig::sign_document(&doc, &subscriber.customer_auth_key)
}

/// Transfer request of a download transaction (segments 2..=N; segment
/// 1 always arrives embedded in the init response).
pub fn make_download_transfer_request(
    subscriber: &EbicsSubscriberState,
    transaction_id: &str,
    segment_number: u32,
    num_segments: u32,
) -> Result<String, Error> {
    let mut segment = Element::new(ns::node::SEGMENT_NUMBER);
    if segment_number == num_segments {
        segment = segment.attr(ns::attr::LAST_SEGMENT, "true");
    }
    let doc = ebics_request(
        Element::new(ns::node::HEADER)
            .attr(ns::attr::AUTHENTICATE, "true")
            .child(
                Element::new(ns::node::STATIC)
                    .child(Element::new(ns::node::HOST_ID).text(&subscriber.host_id))
                    .child(Element::new(ns::node::TRANSACTION_ID).text(transaction_id)),
            )
            .child(
                Element::new(ns::node::MUTABLE)
                    .child(Element::new(ns::node::TRANSACTION_PHASE).text("Transfer"))
                    .child(segment.text(segment_number.to_string())),
            ),
        Element::new(ns::node::BODY),
    );
    skeppsbron_dsig::sign_document(&doc, &subscriber.customer_auth_key)
}

/// Receipt request acknowledging a completed download.
pub fn make_download_receipt_request(
    subscriber: &EbicsSubscriberState,
    transaction_id: &str,
) -> Result<String, Error> {
    let doc = ebics_request(
        Element::new(ns::node::HEADER)
            .attr(ns::attr::AUTHENTICATE, "true")
            .child(
                Element::new(ns::node::STATIC)
                    .child(Element::new(ns::node::HOST_ID).text(&subscriber.host_id))
                    .child(Element::new(ns::node::TRANSACTION_ID).text(transaction_id)),
            )
            .child(
                Element::new(ns::node::MUTABLE)
                    .child(Element::new(ns::node::TRANSACTION_PHASE).text("Receipt")),
            ),
        Element::new(ns::node::BODY).child(
            Element::new(ns::node::TRANSFER_RECEIPT)
                .attr(ns::attr::AUTHENTICATE, "true")
                .child(Element::new(ns::node::RECEIPT_CODE).text("0")),
        ),
    );
    skeppsbron_dsig::sign_document(&doc, &subscriber.customer_auth_key)
}

/// Prepare an upload payload: A006-sign it, wrap the signature in an
/// encrypted `UserSignatureData`, then compress, encrypt and chunk the
/// payload itself — all under one transaction key.
pub fn prepare_upload_payload(
    subscriber: &EbicsSubscriberState,
    payload: &[u8],
) -> Result<PreparedUploadData, Error> {
    let (_, bank_enc_pub) = subscriber.require_bank_keys()?;

    let signature = sign_a006(&digest_order_a006(payload), &subscriber.customer_sign_key)?;
    let signature_doc = user_signature_data(subscriber, &signature);
    let signature_envelope =
        encrypt_e002(&order::encode_order_data(signature_doc.as_bytes())?, bank_enc_pub)?;

    let compressed = order::encode_order_data(payload)?;
    let payload_envelope =
        encrypt_e002_with_key(&compressed, bank_enc_pub, signature_envelope.transaction_key)?;

    Ok(PreparedUploadData {
        encrypted_transaction_key: signature_envelope.encrypted_transaction_key,
        encrypted_signature_data: signature_envelope.encrypted_data,
        encrypted_payload_chunks: order::chunk_encrypted_payload(
            &payload_envelope.encrypted_data,
        ),
    })
}

/// Initialization request of an upload transaction.
pub fn make_upload_init_request(
    subscriber: &EbicsSubscriberState,
    order_type: &str,
    order_params: &OrderParams,
    prepared: &PreparedUploadData,
) -> Result<String, Error> {
    let (bank_auth_pub, bank_enc_pub) = subscriber.require_bank_keys()?;
    let b64 = base64::engine::general_purpose::STANDARD;

    let static_header = Element::new(ns::node::STATIC)
        .child(Element::new(ns::node::HOST_ID).text(&subscriber.host_id))
        .child(Element::new(ns::node::NONCE).text(order::generate_nonce()))
        .child(Element::new(ns::node::TIMESTAMP).text(order::timestamp_now()))
        .child(Element::new(ns::node::PARTNER_ID).text(&subscriber.partner_id))
        .child(Element::new(ns::node::USER_ID).text(&subscriber.user_id))
        .opt_child(
            subscriber
                .system_id
                .as_ref()
                .map(|s| Element::new(ns::node::SYSTEM_ID).text(s)),
        )
        .child(order_details(order_type, "OZHNN", order_params))
        .child(bank_pub_key_digests(bank_auth_pub, bank_enc_pub))
        .child(Element::new(ns::node::SECURITY_MEDIUM).text(algorithm::SECURITY_MEDIUM))
        .child(
            Element::new(ns::node::NUM_SEGMENTS).text(prepared.num_segments().to_string()),
        );

    let data_transfer = Element::new(ns::node::DATA_TRANSFER)
        .child(
            Element::new(ns::node::DATA_ENCRYPTION_INFO)
                .attr(ns::attr::AUTHENTICATE, "true")
                .child(
                    Element::new(ns::node::ENCRYPTION_PUB_KEY_DIGEST)
                        .attr(ns::attr::VERSION, algorithm::ENCRYPTION_VERSION_E002)
                        .attr(ns::attr::ALGORITHM, algorithm::SHA256)
                        .text(b64.encode(public_key_hash(bank_enc_pub))),
                )
                .child(
                    Element::new(ns::node::TRANSACTION_KEY)
                        .text(b64.encode(&prepared.encrypted_transaction_key)),
                ),
        )
        .child(
            Element::new(ns::node::SIGNATURE_DATA)
                .attr(ns::attr::AUTHENTICATE, "true")
                .text(b64.encode(&prepared.encrypted_signature_data)),
        );

    let doc = ebics_request(
        Element::new(ns::node::HEADER)
            .attr(ns::attr::AUTHENTICATE, "true")
            .child(static_header)
            .child(
                Element::new(ns::node::MUTABLE)
                    .child(Element::new(ns::node::TRANSACTION_PHASE).text("Initialisation")),
            ),
        Element::new(ns::node::BODY).child(data_transfer),
    );
    skeppsbron_dsig::sign_document(&doc, &subscriber.customer_auth_key)
}

/// Transfer request of an upload transaction, carrying one payload
/// segment (1-based).
pub fn make_upload_transfer_request(
    subscriber: &EbicsSubscriberState,
    transaction_id: &str,
    prepared: &PreparedUploadData,
    segment_number: u32,
) -> Result<String, Error> {
    let chunk = prepared
        .encrypted_payload_chunks
        .get(segment_number as usize - 1)
        .ok_or_else(|| Error::Other(format!("no upload segment {segment_number}")))?;

    let mut segment = Element::new(ns::node::SEGMENT_NUMBER);
    if segment_number as usize == prepared.num_segments() {
        segment = segment.attr(ns::attr::LAST_SEGMENT, "true");
    }
    let doc = ebics_request(
        Element::new(ns::node::HEADER)
            .attr(ns::attr::AUTHENTICATE, "true")
            .child(
                Element::new(ns::node::STATIC)
                    .child(Element::new(ns::node::HOST_ID).text(&subscriber.host_id))
                    .child(Element::new(ns::node::TRANSACTION_ID).text(transaction_id)),
            )
            .child(
                Element::new(ns::node::MUTABLE)
                    .child(Element::new(ns::node::TRANSACTION_PHASE).text("Transfer"))
                    .child(segment.text(segment_number.to_string())),
            ),
        Element::new(ns::node::BODY).child(
            Element::new(ns::node::DATA_TRANSFER)
                .child(Element::new(ns::node::ORDER_DATA).text(chunk)),
        ),
    );
    skeppsbron_dsig::sign_document(&doc, &subscriber.customer_auth_key)
}

// ── Shared fragments ─────────────────────────────────────────────────

fn ebics_request(header: Element, body: Element) -> String {
    Element::new(ns::node::EBICS_REQUEST)
        .attr("xmlns", ns::EBICS_H004)
        .attr(ns::attr::VERSION, algorithm::PROTOCOL_VERSION)
        .attr(ns::attr::REVISION, algorithm::PROTOCOL_REVISION)
        .child(header)
        .child(Element::new(ns::node::AUTH_SIGNATURE))
        .child(body)
        .to_document_string()
}

fn order_details(order_type: &str, order_attribute: &str, params: &OrderParams) -> Element {
    let params_element = match params {
        OrderParams::Standard => Element::new(ns::node::STANDARD_ORDER_PARAMS),
        OrderParams::DateRange { start, end } => Element::new(ns::node::STANDARD_ORDER_PARAMS)
            .child(
                Element::new(ns::node::DATE_RANGE)
                    .child(Element::new(ns::node::START).text(order::format_date(*start)))
                    .child(Element::new(ns::node::END).text(order::format_date(*end))),
            ),
        OrderParams::Generic(pairs) => {
            let mut e = Element::new(ns::node::GENERIC_ORDER_PARAMS);
            for (name, value) in pairs {
                e = e.child(
                    Element::new(ns::node::PARAMETER)
                        .child(Element::new(ns::node::NAME).text(name))
                        .child(
                            Element::new(ns::node::VALUE)
                                .attr("Type", "string")
                                .text(value),
                        ),
                );
            }
            e
        }
    };
    Element::new(ns::node::ORDER_DETAILS)
        .child(Element::new(ns::node::ORDER_TYPE).text(order_type))
        .child(Element::new(ns::node::ORDER_ATTRIBUTE).text(order_attribute))
        .child(params_element)
}

fn bank_pub_key_digests(auth_pub: &RsaPublicKey, enc_pub: &RsaPublicKey) -> Element {
    let b64 = base64::engine::general_purpose::STANDARD;
    Element::new(ns::node::BANK_PUB_KEY_DIGESTS)
        .child(
            Element::new(ns::node::AUTHENTICATION)
                .attr(ns::attr::VERSION, algorithm::AUTH_VERSION_X002)
                .attr(ns::attr::ALGORITHM, algorithm::SHA256)
                .text(b64.encode(public_key_hash(auth_pub))),
        )
        .child(
            Element::new(ns::node::ENCRYPTION)
                .attr(ns::attr::VERSION, algorithm::ENCRYPTION_VERSION_E002)
                .attr(ns::attr::ALGORITHM, algorithm::SHA256)
                .text(b64.encode(public_key_hash(enc_pub))),
        )
}

/// Common shell of the unsecured INI/HIA requests: order data travels
/// deflated and base64-encoded, and there is no AuthSignature.
fn unsecured_request(
    subscriber: &EbicsSubscriberState,
    order_type: &str,
    order_data_xml: &str,
) -> Result<String, Error> {
    let packed = order::encode_order_data(order_data_xml.as_bytes())?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(packed);

    Ok(Element::new(ns::node::EBICS_UNSECURED_REQUEST)
        .attr("xmlns", ns::EBICS_H004)
        .attr(ns::attr::VERSION, algorithm::PROTOCOL_VERSION)
        .attr(ns::attr::REVISION, algorithm::PROTOCOL_REVISION)
        .child(
            Element::new(ns::node::HEADER)
                .attr(ns::attr::AUTHENTICATE, "true")
                .child(
                    Element::new(ns::node::STATIC)
                        .child(Element::new(ns::node::HOST_ID).text(&subscriber.host_id))
                        .child(Element::new(ns::node::PARTNER_ID).text(&subscriber.partner_id))
                        .child(Element::new(ns::node::USER_ID).text(&subscriber.user_id))
                        .child(
                            Element::new(ns::node::ORDER_DETAILS)
                                .child(Element::new(ns::node::ORDER_TYPE).text(order_type))
                                .child(Element::new(ns::node::ORDER_ATTRIBUTE).text("DZNNN")),
                        )
                        .child(
                            Element::new(ns::node::SECURITY_MEDIUM)
                                .text(algorithm::SECURITY_MEDIUM),
                        ),
                )
                .child(Element::new(ns::node::MUTABLE)),
        )
        .child(
            Element::new(ns::node::BODY).child(
                Element::new(ns::node::DATA_TRANSFER)
                    .child(Element::new(ns::node::ORDER_DATA).text(b64)),
            ),
        )
        .to_document_string())
}

/// INI order data: the A006 signature public key (S001 schema).
fn signature_pub_key_order_data(subscriber: &EbicsSubscriberState) -> Result<String, Error> {
    let public = subscriber.customer_sign_key.to_public_key();
    Ok(Element::new(ns::node::SIGNATURE_PUB_KEY_ORDER_DATA)
        .attr("xmlns", ns::EBICS_S001)
        .attr("xmlns:ds", ns::DSIG)
        .child(
            Element::new(ns::node::SIGNATURE_PUB_KEY_INFO)
                .child(Element::new(ns::node::PUB_KEY_VALUE).child(rsa_key_value(&public)))
                .child(
                    Element::new(ns::node::SIGNATURE_VERSION)
                        .text(algorithm::SIGNATURE_VERSION_A006),
                ),
        )
        .child(Element::new(ns::node::PARTNER_ID).text(&subscriber.partner_id))
        .child(Element::new(ns::node::USER_ID).text(&subscriber.user_id))
        .to_document_string())
}

/// HIA order data: X002 authentication and E002 encryption public keys.
fn hia_request_order_data(subscriber: &EbicsSubscriberState) -> Result<String, Error> {
    let auth_pub = subscriber.customer_auth_key.to_public_key();
    let enc_pub = subscriber.customer_enc_key.to_public_key();
    Ok(Element::new(ns::node::HIA_REQUEST_ORDER_DATA)
        .attr("xmlns", ns::EBICS_H004)
        .attr("xmlns:ds", ns::DSIG)
        .child(
            Element::new(ns::node::AUTHENTICATION_PUB_KEY_INFO)
                .child(Element::new(ns::node::PUB_KEY_VALUE).child(rsa_key_value(&auth_pub)))
                .child(
                    Element::new(ns::node::AUTHENTICATION_VERSION)
                        .text(algorithm::AUTH_VERSION_X002),
                ),
        )
        .child(
            Element::new(ns::node::ENCRYPTION_PUB_KEY_INFO)
                .child(Element::new(ns::node::PUB_KEY_VALUE).child(rsa_key_value(&enc_pub)))
                .child(
                    Element::new(ns::node::ENCRYPTION_VERSION)
                        .text(algorithm::ENCRYPTION_VERSION_E002),
                ),
        )
        .child(Element::new(ns::node::PARTNER_ID).text(&subscriber.partner_id))
        .child(Element::new(ns::node::USER_ID).text(&subscriber.user_id))
        .to_document_string())
}

/// The user signature data document carried by upload transactions
/// (S001 schema), E002-encrypted before transmission.
fn user_signature_data(subscriber: &EbicsSubscriberState, signature: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD;
    Element::new(ns::node::USER_SIGNATURE_DATA)
        .attr("xmlns", ns::EBICS_S001)
        .child(
            Element::new(ns::node::ORDER_SIGNATURE_DATA)
                .child(
                    Element::new(ns::node::SIGNATURE_VERSION)
                        .text(algorithm::SIGNATURE_VERSION_A006),
                )
                .child(Element::new(ns::node::SIGNATURE_VALUE_S001).text(b64.encode(signature)))
                .child(Element::new(ns::node::PARTNER_ID).text(&subscriber.partner_id))
                .child(Element::new(ns::node::USER_ID).text(&subscriber.user_id)),
        )
        .to_document_string()
}

fn rsa_key_value(key: &RsaPublicKey) -> Element {
    let b64 = base64::engine::general_purpose::STANDARD;
    Element::new("ds:RSAKeyValue")
        .child(Element::new("ds:Modulus").text(b64.encode(key.n().to_bytes_be())))
        .child(Element::new("ds:Exponent").text(b64.encode(key.e().to_bytes_be())))
}
