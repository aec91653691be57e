#![forbid(unsafe_code)]

//! The EBICS E002 envelope encryption process.
//!
//! Order payloads are encrypted with a fresh 16-byte AES transaction
//! key (AES-128-CBC, all-zero IV, ANSI X9.23 padding); the transaction
//! key itself travels RSA PKCS#1 v1.5-encrypted under the receiver's
//! encryption public key, next to the SHA-256 hash of that key so the
//! receiver can pick the matching private key.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use skeppsbron_core::Error;

use crate::keys::public_key_hash;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const BLOCK: usize = 16;

/// Result of an E002 encryption.
///
/// The plain transaction key is kept because an upload reuses one key
/// across the signature data and every payload segment.
pub struct EncryptedEnvelope {
    /// Transaction key, RSA-encrypted under the receiver's public key.
    pub encrypted_transaction_key: Vec<u8>,
    /// SHA-256 hash of the receiver's encryption public key.
    pub pub_key_digest: Vec<u8>,
    /// The AES-encrypted payload.
    pub encrypted_data: Vec<u8>,
    /// The plain transaction key, for reuse within one transaction.
    pub transaction_key: [u8; 16],
}

/// Encrypt data under a freshly generated transaction key.
pub fn encrypt_e002(
    data: &[u8],
    encryption_public_key: &RsaPublicKey,
) -> Result<EncryptedEnvelope, Error> {
    let mut transaction_key = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut transaction_key);
    encrypt_e002_with_key(data, encryption_public_key, transaction_key)
}

/// Encrypt data under an existing transaction key.
pub fn encrypt_e002_with_key(
    data: &[u8],
    encryption_public_key: &RsaPublicKey,
    transaction_key: [u8; 16],
) -> Result<EncryptedEnvelope, Error> {
    let iv = [0u8; BLOCK];
    let mut buf = x923_pad(data);
    let len = buf.len();
    let enc = Aes128CbcEnc::new_from_slices(&transaction_key, &iv)
        .map_err(|e| Error::Encryption(format!("AES-CBC init: {e}")))?;
    enc.encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|e| Error::Encryption(format!("AES-CBC encrypt: {e}")))?;

    let mut rng = rand::thread_rng();
    let encrypted_transaction_key = encryption_public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &transaction_key)
        .map_err(|e| Error::Encryption(format!("RSA key transport: {e}")))?;

    Ok(EncryptedEnvelope {
        encrypted_transaction_key,
        pub_key_digest: public_key_hash(encryption_public_key),
        encrypted_data: buf,
        transaction_key,
    })
}

/// Decrypt an E002 envelope: unwrap the transaction key with the RSA
/// private key, then AES-decrypt the payload.
pub fn decrypt_e002(
    encrypted_transaction_key: &[u8],
    encrypted_data: &[u8],
    private_key: &RsaPrivateKey,
) -> Result<Vec<u8>, Error> {
    let transaction_key = private_key
        .decrypt(Pkcs1v15Encrypt, encrypted_transaction_key)
        .map_err(|e| Error::Decryption(format!("RSA key transport: {e}")))?;
    if transaction_key.len() != 16 {
        return Err(Error::Decryption(format!(
            "transaction key must be 16 bytes, got {}",
            transaction_key.len()
        )));
    }

    if encrypted_data.is_empty() || encrypted_data.len() % BLOCK != 0 {
        return Err(Error::Decryption("ciphertext length not a block multiple".into()));
    }
    let iv = [0u8; BLOCK];
    let mut buf = encrypted_data.to_vec();
    let dec = Aes128CbcDec::new_from_slices(&transaction_key, &iv)
        .map_err(|e| Error::Decryption(format!("AES-CBC init: {e}")))?;
    dec.decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| Error::Decryption(format!("AES-CBC decrypt: {e}")))?;

    x923_unpad(&buf)
}

/// ANSI X9.23 padding: fill bytes then a final length byte, always at
/// least one byte of padding.
fn x923_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK - data.len() % BLOCK;
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    let mut fill = vec![0u8; pad_len - 1];
    rand::thread_rng().fill_bytes(&mut fill);
    out.extend_from_slice(&fill);
    out.push(pad_len as u8);
    out
}

fn x923_unpad(data: &[u8]) -> Result<Vec<u8>, Error> {
    let pad_len = *data.last().ok_or_else(|| Error::Decryption("empty plaintext".into()))?
        as usize;
    if pad_len == 0 || pad_len > BLOCK || pad_len > data.len() {
        return Err(Error::Decryption("invalid padding".into()));
    }
    Ok(data[..data.len() - pad_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_rsa_keypair;

    #[test]
    fn test_padding_roundtrip() {
        for len in [0usize, 1, 15, 16, 17, 31, 32] {
            let data = vec![0x42u8; len];
            let padded = x923_pad(&data);
            assert_eq!(padded.len() % BLOCK, 0);
            assert_eq!(x923_unpad(&padded).unwrap(), data);
        }
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_rsa_keypair(2048).unwrap();
        let payload = b"<Document>statement body</Document>".repeat(40);
        let env = encrypt_e002(&payload, &key.to_public_key()).unwrap();
        assert_eq!(env.pub_key_digest.len(), 32);
        let plain = decrypt_e002(&env.encrypted_transaction_key, &env.encrypted_data, &key)
            .unwrap();
        assert_eq!(plain, payload);
    }

    #[test]
    fn test_key_reuse_across_envelopes() {
        let key = generate_rsa_keypair(2048).unwrap();
        let first = encrypt_e002(b"first", &key.to_public_key()).unwrap();
        let second =
            encrypt_e002_with_key(b"second", &key.to_public_key(), first.transaction_key)
                .unwrap();
        assert_eq!(first.transaction_key, second.transaction_key);
        let plain = decrypt_e002(&second.encrypted_transaction_key, &second.encrypted_data, &key)
            .unwrap();
        assert_eq!(plain, b"second");
    }

    #[test]
    fn test_wrong_private_key_fails() {
        let key = generate_rsa_keypair(2048).unwrap();
        let other = generate_rsa_keypair(2048).unwrap();
        let env = encrypt_e002(b"secret", &key.to_public_key()).unwrap();
        assert!(decrypt_e002(&env.encrypted_transaction_key, &env.encrypted_data, &other)
            .is_err());
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let key = generate_rsa_keypair(2048).unwrap();
        let env = encrypt_e002(&vec![7u8; 100], &key.to_public_key()).unwrap();
        let truncated = &env.encrypted_data[..env.encrypted_data.len() - 1];
        assert!(decrypt_e002(&env.encrypted_transaction_key, truncated, &key).is_err());
    }
}
