#![forbid(unsafe_code)]

//! A scripted in-process bank host for tests.
//!
//! Speaks just enough H004 to exercise the client: it verifies request
//! signatures with the customer's authentication key, signs its own
//! responses with the bank authentication key, serves staged download
//! payloads in segments, and records uploads so tests can check what
//! the bank-side view decrypts to.

use async_trait::async_trait;
use base64::Engine;
use rsa::RsaPrivateKey;
use skeppsbron_core::{ns, Error, Result};
use skeppsbron_crypto::e002::{decrypt_e002, encrypt_e002};
use skeppsbron_crypto::keys::{generate_rsa_keypair, public_key_hash};
use skeppsbron_messages::order::{decode_order_data, encode_order_data};
use skeppsbron_messages::{EbicsKeyState, EbicsSubscriberState};
use skeppsbron_xml::Element;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::transport::EbicsTransport;

pub struct TestBank {
    bank_auth_key: RsaPrivateKey,
    bank_enc_key: RsaPrivateKey,
    customer_sign_key: RsaPrivateKey,
    customer_auth_key: RsaPrivateKey,
    customer_enc_key: RsaPrivateKey,
    state: Mutex<BankState>,
}

#[derive(Default)]
struct BankState {
    counters: HashMap<String, u32>,
    staged_chunks: Vec<String>,
    staged_encrypted_key: Vec<u8>,
    technical_override: Option<String>,
    bank_override: Option<String>,
    hpb_enabled: bool,
    upload_encrypted_key: Vec<u8>,
    upload_chunks: Vec<String>,
}

impl TestBank {
    pub fn new() -> Self {
        let bank = Self {
            bank_auth_key: generate_rsa_keypair(2048).unwrap(),
            bank_enc_key: generate_rsa_keypair(2048).unwrap(),
            customer_sign_key: generate_rsa_keypair(2048).unwrap(),
            customer_auth_key: generate_rsa_keypair(2048).unwrap(),
            customer_enc_key: generate_rsa_keypair(2048).unwrap(),
            state: Mutex::new(BankState { hpb_enabled: true, ..Default::default() }),
        };
        bank.stage_download(b"<Document>default</Document>", 1);
        bank
    }

    /// Subscriber that already completed INI/HIA/HPB.
    pub fn provisioned_subscriber(&self) -> EbicsSubscriberState {
        let mut sub = self.fresh_subscriber(EbicsKeyState::Sent);
        sub.bank_auth_pub = Some(self.bank_auth_key.to_public_key());
        sub.bank_enc_pub = Some(self.bank_enc_key.to_public_key());
        sub
    }

    /// Subscriber that has not exchanged any keys yet.
    pub fn fresh_subscriber(&self, key_state: EbicsKeyState) -> EbicsSubscriberState {
        EbicsSubscriberState {
            ebics_url: "https://testbank.invalid/ebicsweb".into(),
            host_id: "TESTHOST".into(),
            partner_id: "PARTNER1".into(),
            user_id: "USER1".into(),
            system_id: None,
            customer_sign_key: self.customer_sign_key.clone(),
            customer_auth_key: self.customer_auth_key.clone(),
            customer_enc_key: self.customer_enc_key.clone(),
            bank_auth_pub: None,
            bank_enc_pub: None,
            ini_state: key_state,
            hia_state: key_state,
        }
    }

    /// Stage a download payload, pre-encrypted and split into segments.
    pub fn stage_download(&self, payload: &[u8], num_segments: usize) {
        let compressed = encode_order_data(payload).unwrap();
        let envelope =
            encrypt_e002(&compressed, &self.customer_enc_key.to_public_key()).unwrap();
        let b64 = base64::engine::general_purpose::STANDARD.encode(&envelope.encrypted_data);
        let mut state = self.state.lock().unwrap();
        state.staged_chunks = split_base64(&b64, num_segments);
        state.staged_encrypted_key = envelope.encrypted_transaction_key;
    }

    pub fn set_technical_return_code(&self, code: &str) {
        self.state.lock().unwrap().technical_override = Some(code.to_owned());
    }

    pub fn set_bank_return_code(&self, code: &str) {
        self.state.lock().unwrap().bank_override = Some(code.to_owned());
    }

    /// Make HPB fail with a technical error, as banks do before the
    /// subscriber keys are activated.
    pub fn disable_hpb(&self) {
        self.state.lock().unwrap().hpb_enabled = false;
    }

    pub fn enable_hpb(&self) {
        self.state.lock().unwrap().hpb_enabled = true;
    }

    pub fn request_count(&self, kind: &str) -> u32 {
        *self.state.lock().unwrap().counters.get(kind).unwrap_or(&0)
    }

    /// Decrypt and inflate what the client uploaded, as the bank would.
    pub fn last_uploaded_payload(&self) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let joined: String = state.upload_chunks.concat();
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(joined)
            .map_err(|e| Error::Base64(e.to_string()))?;
        let compressed =
            decrypt_e002(&state.upload_encrypted_key, &ciphertext, &self.bank_enc_key)?;
        decode_order_data(&compressed)
    }

    fn bump(&self, kind: &str) {
        *self
            .state
            .lock()
            .unwrap()
            .counters
            .entry(kind.to_owned())
            .or_insert(0) += 1;
    }

    // ── Response construction ────────────────────────────────────────

    fn signed_response(&self, technical: &str, bank: &str, extra: ResponseData) -> String {
        let b64 = base64::engine::general_purpose::STANDARD;
        let mut static_header = Element::new("static");
        if let Some(tid) = &extra.transaction_id {
            static_header = static_header.child(Element::new("TransactionID").text(tid));
        }
        if let Some(n) = extra.num_segments {
            static_header =
                static_header.child(Element::new("NumSegments").text(n.to_string()));
        }

        let mut body = Element::new("body");
        if let Some((key, chunk)) = &extra.data {
            body = body.child(
                Element::new("DataTransfer")
                    .child(
                        Element::new("DataEncryptionInfo")
                            .attr("authenticate", "true")
                            .child(
                                Element::new("EncryptionPubKeyDigest")
                                    .attr("Version", "E002")
                                    .attr("Algorithm", skeppsbron_core::algorithm::SHA256)
                                    .text(b64.encode(public_key_hash(
                                        &self.customer_enc_key.to_public_key(),
                                    ))),
                            )
                            .child(Element::new("TransactionKey").text(b64.encode(key))),
                    )
                    .child(Element::new("OrderData").text(chunk)),
            );
        }
        body = body.child(
            Element::new("ReturnCode").attr("authenticate", "true").text(bank),
        );

        let doc = Element::new("ebicsResponse")
            .attr("xmlns", ns::EBICS_H004)
            .attr("Version", "H004")
            .attr("Revision", "1")
            .child(
                Element::new("header")
                    .attr("authenticate", "true")
                    .child(static_header)
                    .child(
                        Element::new("mutable")
                            .child(Element::new("TransactionPhase").text(extra.phase))
                            .child(Element::new("ReturnCode").text(technical))
                            .child(Element::new("ReportText").text("scripted")),
                    ),
            )
            .child(Element::new("AuthSignature"))
            .child(body)
            .to_document_string();
        skeppsbron_dsig::sign_document(&doc, &self.bank_auth_key).unwrap()
    }

    fn key_management_response(
        &self,
        technical: &str,
        bank: &str,
        order_data: Option<&[u8]>,
    ) -> String {
        let b64 = base64::engine::general_purpose::STANDARD;
        let mut body = Element::new("body");
        if let Some(data) = order_data {
            let compressed = encode_order_data(data).unwrap();
            let envelope =
                encrypt_e002(&compressed, &self.customer_enc_key.to_public_key()).unwrap();
            body = body.child(
                Element::new("DataTransfer")
                    .child(
                        Element::new("DataEncryptionInfo")
                            .attr("authenticate", "true")
                            .child(
                                Element::new("EncryptionPubKeyDigest")
                                    .attr("Version", "E002")
                                    .attr("Algorithm", skeppsbron_core::algorithm::SHA256)
                                    .text(b64.encode(public_key_hash(
                                        &self.customer_enc_key.to_public_key(),
                                    ))),
                            )
                            .child(
                                Element::new("TransactionKey")
                                    .text(b64.encode(&envelope.encrypted_transaction_key)),
                            ),
                    )
                    .child(
                        Element::new("OrderData").text(b64.encode(&envelope.encrypted_data)),
                    ),
            );
        }
        body = body.child(Element::new("ReturnCode").text(bank));

        Element::new("ebicsKeyManagementResponse")
            .attr("xmlns", ns::EBICS_H004)
            .attr("Version", "H004")
            .attr("Revision", "1")
            .child(
                Element::new("header")
                    .attr("authenticate", "true")
                    .child(Element::new("static"))
                    .child(
                        Element::new("mutable")
                            .child(Element::new("ReturnCode").text(technical))
                            .child(Element::new("ReportText").text("scripted")),
                    ),
            )
            .child(body)
            .to_document_string()
    }

    fn hpb_order_data(&self) -> String {
        use rsa::traits::PublicKeyParts;
        let b64 = base64::engine::general_purpose::STANDARD;
        let key_value = |key: &rsa::RsaPublicKey| {
            Element::new("ds:RSAKeyValue")
                .child(Element::new("ds:Modulus").text(b64.encode(key.n().to_bytes_be())))
                .child(Element::new("ds:Exponent").text(b64.encode(key.e().to_bytes_be())))
        };
        Element::new("HPBResponseOrderData")
            .attr("xmlns", ns::EBICS_H004)
            .attr("xmlns:ds", ns::DSIG)
            .child(
                Element::new("AuthenticationPubKeyInfo")
                    .child(
                        Element::new("PubKeyValue")
                            .child(key_value(&self.bank_auth_key.to_public_key())),
                    )
                    .child(Element::new("AuthenticationVersion").text("X002")),
            )
            .child(
                Element::new("EncryptionPubKeyInfo")
                    .child(
                        Element::new("PubKeyValue")
                            .child(key_value(&self.bank_enc_key.to_public_key())),
                    )
                    .child(Element::new("EncryptionVersion").text("E002")),
            )
            .child(Element::new("HostID").text("TESTHOST"))
            .to_document_string()
    }

    fn overridden_codes(&self) -> (String, String) {
        let state = self.state.lock().unwrap();
        (
            state.technical_override.clone().unwrap_or_else(|| "000000".into()),
            state.bank_override.clone().unwrap_or_else(|| "000000".into()),
        )
    }
}

struct ResponseData {
    phase: &'static str,
    transaction_id: Option<String>,
    num_segments: Option<u32>,
    data: Option<(Vec<u8>, String)>,
}

impl ResponseData {
    fn bare(phase: &'static str) -> Self {
        Self { phase, transaction_id: None, num_segments: None, data: None }
    }
}

#[async_trait]
impl EbicsTransport for TestBank {
    async fn post(&self, _url: &str, body: String) -> Result<String> {
        let doc = roxmltree::Document::parse(&body)
            .map_err(|e| Error::XmlParse(format!("test bank received garbage: {e}")))?;
        let root = doc.root_element().tag_name().name().to_owned();

        match root.as_str() {
            "ebicsHEVRequest" => {
                self.bump("hev");
                Ok(Element::new("ebicsHEVResponse")
                    .attr("xmlns", ns::EBICS_H000)
                    .child(
                        Element::new("SystemReturnCode")
                            .child(Element::new("ReturnCode").text("000000"))
                            .child(Element::new("ReportText").text("[EBICS_OK]")),
                    )
                    .child(
                        Element::new("VersionNumber")
                            .attr("ProtocolVersion", "H004")
                            .text("02.50"),
                    )
                    .to_document_string())
            }
            "ebicsUnsecuredRequest" => {
                let order_type = find_text(&doc, "OrderType");
                let kind = if order_type == "INI" { "ini" } else { "hia" };
                self.bump(kind);
                let (technical, bank) = self.overridden_codes();
                Ok(self.key_management_response(&technical, &bank, None))
            }
            "ebicsNoPubKeyDigestsRequest" => {
                self.bump("hpb");
                skeppsbron_dsig::verify_document(
                    &body,
                    &self.customer_auth_key.to_public_key(),
                )?;
                if !self.state.lock().unwrap().hpb_enabled {
                    return Ok(self.key_management_response("091002", "000000", None));
                }
                let order_data = self.hpb_order_data();
                Ok(self.key_management_response("000000", "000000", Some(order_data.as_bytes())))
            }
            "ebicsRequest" => {
                skeppsbron_dsig::verify_document(
                    &body,
                    &self.customer_auth_key.to_public_key(),
                )?;
                let phase = find_text(&doc, "TransactionPhase");
                let has_order_data = find_text(&doc, "OrderData") != "";
                let has_data_transfer = doc
                    .descendants()
                    .any(|n| n.is_element() && n.tag_name().name() == "DataTransfer");
                match phase.as_str() {
                    "Initialisation" if has_data_transfer => {
                        self.bump("upload-init");
                        let (technical, bank) = self.overridden_codes();
                        let key = base64::engine::general_purpose::STANDARD
                            .decode(find_text(&doc, "TransactionKey"))
                            .map_err(|e| Error::Base64(e.to_string()))?;
                        self.state.lock().unwrap().upload_encrypted_key = key;
                        self.state.lock().unwrap().upload_chunks.clear();
                        Ok(self.signed_response(&technical, &bank, ResponseData {
                            phase: "Initialisation",
                            transaction_id: Some("T-UL-1".into()),
                            num_segments: None,
                            data: None,
                        }))
                    }
                    "Initialisation" => {
                        self.bump("download-init");
                        let (technical, bank) = self.overridden_codes();
                        if technical != "000000" || bank != "000000" {
                            return Ok(self.signed_response(
                                &technical,
                                &bank,
                                ResponseData::bare("Initialisation"),
                            ));
                        }
                        let state = self.state.lock().unwrap();
                        let chunks = state.staged_chunks.clone();
                        let key = state.staged_encrypted_key.clone();
                        drop(state);
                        Ok(self.signed_response("000000", "000000", ResponseData {
                            phase: "Initialisation",
                            transaction_id: Some("T-DL-1".into()),
                            num_segments: Some(chunks.len() as u32),
                            data: Some((key, chunks[0].clone())),
                        }))
                    }
                    "Transfer" if has_order_data => {
                        self.bump("upload-transfer");
                        let (technical, bank) = self.overridden_codes();
                        self.state
                            .lock()
                            .unwrap()
                            .upload_chunks
                            .push(find_text(&doc, "OrderData"));
                        Ok(self.signed_response(&technical, &bank, ResponseData::bare("Transfer")))
                    }
                    "Transfer" => {
                        self.bump("download-transfer");
                        let segment: usize = find_text(&doc, "SegmentNumber")
                            .parse()
                            .map_err(|_| Error::XmlStructure("bad SegmentNumber".into()))?;
                        let state = self.state.lock().unwrap();
                        let chunk = state
                            .staged_chunks
                            .get(segment - 1)
                            .cloned()
                            .ok_or_else(|| Error::Other(format!("no segment {segment}")))?;
                        let key = state.staged_encrypted_key.clone();
                        drop(state);
                        Ok(self.signed_response("000000", "000000", ResponseData {
                            phase: "Transfer",
                            transaction_id: None,
                            num_segments: None,
                            data: Some((key, chunk)),
                        }))
                    }
                    "Receipt" => {
                        self.bump("receipt");
                        Ok(self.signed_response("011000", "000000", ResponseData::bare("Receipt")))
                    }
                    other => Err(Error::Other(format!("test bank: unknown phase {other}"))),
                }
            }
            other => Err(Error::Other(format!("test bank: unknown root {other}"))),
        }
    }
}

fn find_text(doc: &roxmltree::Document<'_>, local_name: &str) -> String {
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == local_name)
        .and_then(|n| n.text())
        .unwrap_or("")
        .trim()
        .to_owned()
}

/// Split a base64 string into `n` parts on 4-character boundaries.
fn split_base64(b64: &str, n: usize) -> Vec<String> {
    if n <= 1 || b64.len() <= 4 {
        return vec![b64.to_owned()];
    }
    let quads = b64.len() / 4;
    let per = usize::max(1, quads.div_ceil(n)) * 4;
    b64.as_bytes()
        .chunks(per)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}
