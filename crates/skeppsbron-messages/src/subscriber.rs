#![forbid(unsafe_code)]

//! Subscriber state: everything needed to sign, verify and encrypt on
//! behalf of one bank connection.

use rsa::{RsaPrivateKey, RsaPublicKey};
use skeppsbron_core::Error;
use skeppsbron_crypto::keys::public_key_hash;

/// Progress of an INI or HIA key submission.
///
/// There is no direct `Unknown → Sent` transition; a state only becomes
/// `Sent` after an actual request attempt succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbicsKeyState {
    Unknown,
    NotSent,
    Sent,
}

/// Immutable snapshot of one EBICS subscriber.
///
/// State transitions (INI/HIA submission, HPB key acquisition) produce
/// a new snapshot rather than mutating shared fields, so a
/// partially-initialized subscriber can never be observed concurrently.
#[derive(Clone)]
pub struct EbicsSubscriberState {
    pub ebics_url: String,
    pub host_id: String,
    pub partner_id: String,
    pub user_id: String,
    pub system_id: Option<String>,
    pub customer_sign_key: RsaPrivateKey,
    pub customer_auth_key: RsaPrivateKey,
    pub customer_enc_key: RsaPrivateKey,
    pub bank_auth_pub: Option<RsaPublicKey>,
    pub bank_enc_pub: Option<RsaPublicKey>,
    pub ini_state: EbicsKeyState,
    pub hia_state: EbicsKeyState,
}

impl EbicsSubscriberState {
    /// Both bank public keys, or a fail-fast `KeyState` error telling
    /// the caller to run HPB first.
    pub fn require_bank_keys(&self) -> Result<(&RsaPublicKey, &RsaPublicKey), Error> {
        match (&self.bank_auth_pub, &self.bank_enc_pub) {
            (Some(auth), Some(enc)) => Ok((auth, enc)),
            _ => Err(Error::KeyState(
                "bank public keys missing, request HPB first".into(),
            )),
        }
    }

    /// Whether the subscriber can run transactions needing bank crypto.
    pub fn has_bank_keys(&self) -> bool {
        self.bank_auth_pub.is_some() && self.bank_enc_pub.is_some()
    }

    /// Pick the customer private key whose public hash matches the
    /// digest carried in a `DataEncryptionInfo`.
    pub fn decryption_key_for(&self, pub_digest: &[u8]) -> Result<&RsaPrivateKey, Error> {
        let auth_digest = public_key_hash(&self.customer_auth_key.to_public_key());
        if pub_digest == auth_digest.as_slice() {
            return Ok(&self.customer_auth_key);
        }
        let enc_digest = public_key_hash(&self.customer_enc_key.to_public_key());
        if pub_digest == enc_digest.as_slice() {
            return Ok(&self.customer_enc_key);
        }
        Err(Error::Key(
            "no customer key matches the encryption public key digest".into(),
        ))
    }

    /// Snapshot with updated INI/HIA submission states.
    pub fn with_key_states(&self, ini: EbicsKeyState, hia: EbicsKeyState) -> Self {
        let mut next = self.clone();
        next.ini_state = ini;
        next.hia_state = hia;
        next
    }

    /// Snapshot with freshly fetched bank public keys.
    pub fn with_bank_keys(&self, auth: RsaPublicKey, enc: RsaPublicKey) -> Self {
        let mut next = self.clone();
        next.bank_auth_pub = Some(auth);
        next.bank_enc_pub = Some(enc);
        next
    }
}

impl std::fmt::Debug for EbicsSubscriberState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EbicsSubscriberState")
            .field("ebics_url", &self.ebics_url)
            .field("host_id", &self.host_id)
            .field("partner_id", &self.partner_id)
            .field("user_id", &self.user_id)
            .field("system_id", &self.system_id)
            .field("bank_auth_pub", &self.bank_auth_pub.is_some())
            .field("bank_enc_pub", &self.bank_enc_pub.is_some())
            .field("ini_state", &self.ini_state)
            .field("hia_state", &self.hia_state)
            .finish()
    }
}
