#![forbid(unsafe_code)]

//! Passphrase protection for exported subscriber keys.
//!
//! Backups carry the three customer private keys encrypted under a key
//! derived from a user passphrase: PBKDF2-HMAC-SHA256 over a random
//! salt, then AES-256-CBC.  A wrong passphrase decrypts to noise; that
//! is detected by the padding check or the PKCS#8 re-parse and reported
//! as `BackupPassphrase` so callers can say "bad backup" instead of
//! crashing.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use skeppsbron_core::Error;

use crate::keys::{encode_rsa_private_key, load_rsa_private_key};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT_LEN: usize = 8;
const ITERATIONS: u32 = 100_000;
const MAGIC: &[u8; 4] = b"SKB1";

/// Encrypt a private key under a passphrase.
///
/// The output is self-describing: magic, salt, iteration count, then
/// the AES-256-CBC ciphertext of the PKCS#8 encoding.
pub fn encrypt_key_with_passphrase(
    key: &RsaPrivateKey,
    passphrase: &str,
) -> Result<Vec<u8>, Error> {
    let der = encode_rsa_private_key(key)?;

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let (aes_key, iv) = derive_key(passphrase, &salt, ITERATIONS);

    let enc = Aes256CbcEnc::new_from_slices(&aes_key, &iv)
        .map_err(|e| Error::Encryption(format!("AES-CBC init: {e}")))?;
    let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(&der);

    let mut out = Vec::with_capacity(4 + SALT_LEN + 4 + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&ITERATIONS.to_be_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a passphrase-protected private key.
///
/// A malformed blob is a `Key` error; a blob that decrypts but does not
/// yield a valid PKCS#8 key is a `BackupPassphrase` error.
pub fn decrypt_key_with_passphrase(
    blob: &[u8],
    passphrase: &str,
) -> Result<RsaPrivateKey, Error> {
    if blob.len() < 4 + SALT_LEN + 4 || &blob[..4] != MAGIC {
        return Err(Error::Key("not a protected key blob".into()));
    }
    let salt = &blob[4..4 + SALT_LEN];
    let mut iter_bytes = [0u8; 4];
    iter_bytes.copy_from_slice(&blob[4 + SALT_LEN..4 + SALT_LEN + 4]);
    let iterations = u32::from_be_bytes(iter_bytes);
    let ciphertext = &blob[4 + SALT_LEN + 4..];
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(Error::Key("truncated protected key blob".into()));
    }

    let (aes_key, iv) = derive_key(passphrase, salt, iterations);
    let dec = Aes256CbcDec::new_from_slices(&aes_key, &iv)
        .map_err(|e| Error::Decryption(format!("AES-CBC init: {e}")))?;
    let der = dec
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::BackupPassphrase)?;

    load_rsa_private_key(&der).map_err(|_| Error::BackupPassphrase)
}

/// Derive the AES key and IV from the passphrase: 48 bytes of PBKDF2
/// output, split 32/16.
fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> ([u8; 32], [u8; 16]) {
    let mut okm = [0u8; 48];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut okm);
    let mut key = [0u8; 32];
    let mut iv = [0u8; 16];
    key.copy_from_slice(&okm[..32]);
    iv.copy_from_slice(&okm[32..]);
    (key, iv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_rsa_keypair;

    #[test]
    fn test_backup_roundtrip() {
        let key = generate_rsa_keypair(2048).unwrap();
        let blob = encrypt_key_with_passphrase(&key, "correct horse").unwrap();
        let restored = decrypt_key_with_passphrase(&blob, "correct horse").unwrap();
        assert_eq!(key, restored);
    }

    #[test]
    fn test_wrong_passphrase_is_distinct_error() {
        let key = generate_rsa_keypair(2048).unwrap();
        let blob = encrypt_key_with_passphrase(&key, "correct horse").unwrap();
        match decrypt_key_with_passphrase(&blob, "battery staple") {
            Err(Error::BackupPassphrase) => {}
            other => panic!("expected BackupPassphrase, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_blob_rejected() {
        assert!(matches!(
            decrypt_key_with_passphrase(b"nonsense", "pw"),
            Err(Error::Key(_))
        ));
    }
}
