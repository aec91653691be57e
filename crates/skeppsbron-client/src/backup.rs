#![forbid(unsafe_code)]

//! Export and import of passphrase-protected subscriber key backups.
//!
//! The backup document is JSON carrying the connection coordinates and
//! the three customer private keys, each encrypted under the
//! passphrase.  Importing with a wrong passphrase reports "bad backup"
//! instead of crashing.

use base64::Engine;
use serde::{Deserialize, Serialize};
use skeppsbron_core::{Error, Result};
use skeppsbron_crypto::backup::{decrypt_key_with_passphrase, encrypt_key_with_passphrase};
use skeppsbron_messages::{EbicsKeyState, EbicsSubscriberState};

/// Serialized key backup.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeysBackup {
    pub ebics_url: String,
    pub host_id: String,
    pub partner_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system_id: Option<String>,
    /// Passphrase-protected private keys, base64-encoded.
    pub sign_key: String,
    pub auth_key: String,
    pub enc_key: String,
}

/// Export a subscriber's keys under a passphrase.
pub fn export_backup(
    subscriber: &EbicsSubscriberState,
    passphrase: &str,
) -> Result<KeysBackup> {
    let b64 = base64::engine::general_purpose::STANDARD;
    Ok(KeysBackup {
        ebics_url: subscriber.ebics_url.clone(),
        host_id: subscriber.host_id.clone(),
        partner_id: subscriber.partner_id.clone(),
        user_id: subscriber.user_id.clone(),
        system_id: subscriber.system_id.clone(),
        sign_key: b64.encode(encrypt_key_with_passphrase(
            &subscriber.customer_sign_key,
            passphrase,
        )?),
        auth_key: b64.encode(encrypt_key_with_passphrase(
            &subscriber.customer_auth_key,
            passphrase,
        )?),
        enc_key: b64.encode(encrypt_key_with_passphrase(
            &subscriber.customer_enc_key,
            passphrase,
        )?),
    })
}

/// Restore a subscriber from a backup.
///
/// The restored subscriber starts with `Unknown` INI/HIA states and no
/// bank keys: the next `connect` probes the bank with a tentative HPB
/// to find out where the registration stands.
pub fn import_backup(backup: &KeysBackup, passphrase: &str) -> Result<EbicsSubscriberState> {
    let b64 = base64::engine::general_purpose::STANDARD;
    let decode_key = |data: &str| -> Result<rsa::RsaPrivateKey> {
        let blob = b64
            .decode(data)
            .map_err(|e| Error::Base64(format!("backup key: {e}")))?;
        decrypt_key_with_passphrase(&blob, passphrase)
    };

    Ok(EbicsSubscriberState {
        ebics_url: backup.ebics_url.clone(),
        host_id: backup.host_id.clone(),
        partner_id: backup.partner_id.clone(),
        user_id: backup.user_id.clone(),
        system_id: backup.system_id.clone(),
        customer_sign_key: decode_key(&backup.sign_key)?,
        customer_auth_key: decode_key(&backup.auth_key)?,
        customer_enc_key: decode_key(&backup.enc_key)?,
        bank_auth_pub: None,
        bank_enc_pub: None,
        ini_state: EbicsKeyState::Unknown,
        hia_state: EbicsKeyState::Unknown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skeppsbron_crypto::keys::generate_rsa_keypair;

    fn subscriber() -> EbicsSubscriberState {
        EbicsSubscriberState {
            ebics_url: "https://bank.example.com/ebicsweb".into(),
            host_id: "HOST01".into(),
            partner_id: "PARTNER1".into(),
            user_id: "USER1".into(),
            system_id: Some("SYS1".into()),
            customer_sign_key: generate_rsa_keypair(2048).unwrap(),
            customer_auth_key: generate_rsa_keypair(2048).unwrap(),
            customer_enc_key: generate_rsa_keypair(2048).unwrap(),
            bank_auth_pub: None,
            bank_enc_pub: None,
            ini_state: EbicsKeyState::Sent,
            hia_state: EbicsKeyState::Sent,
        }
    }

    #[test]
    fn test_backup_roundtrip_through_json() {
        let original = subscriber();
        let backup = export_backup(&original, "passphrase").unwrap();
        let json = serde_json::to_string(&backup).unwrap();
        let parsed: KeysBackup = serde_json::from_str(&json).unwrap();

        let restored = import_backup(&parsed, "passphrase").unwrap();
        assert_eq!(restored.customer_sign_key, original.customer_sign_key);
        assert_eq!(restored.customer_auth_key, original.customer_auth_key);
        assert_eq!(restored.customer_enc_key, original.customer_enc_key);
        assert_eq!(restored.host_id, "HOST01");
        assert_eq!(restored.system_id.as_deref(), Some("SYS1"));
        // Restored subscribers probe the bank before transacting.
        assert_eq!(restored.ini_state, EbicsKeyState::Unknown);
        assert!(restored.bank_auth_pub.is_none());
    }

    #[test]
    fn test_wrong_passphrase_reports_bad_backup() {
        let backup = export_backup(&subscriber(), "right").unwrap();
        assert!(matches!(
            import_backup(&backup, "wrong"),
            Err(Error::BackupPassphrase)
        ));
    }
}
