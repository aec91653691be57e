#![forbid(unsafe_code)]

//! RSA key generation, encoding and the EBICS public key hash.

use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use skeppsbron_core::Error;

/// Generate a fresh RSA key pair.
///
/// `bits` is the modulus size; EBICS subscribers use 2048 or larger.
pub fn generate_rsa_keypair(bits: usize) -> Result<RsaPrivateKey, Error> {
    let mut rng = rand::thread_rng();
    RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| Error::Key(format!("RSA key generation failed: {e}")))
}

/// Load an RSA private key from its binary PKCS#8 encoding.
pub fn load_rsa_private_key(der: &[u8]) -> Result<RsaPrivateKey, Error> {
    RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| Error::Key(format!("invalid PKCS#8 private key: {e}")))
}

/// Encode an RSA private key to its binary PKCS#8 form.
pub fn encode_rsa_private_key(key: &RsaPrivateKey) -> Result<Vec<u8>, Error> {
    Ok(key
        .to_pkcs8_der()
        .map_err(|e| Error::Key(format!("PKCS#8 encoding failed: {e}")))?
        .as_bytes()
        .to_vec())
}

/// Load an RSA public key from its big-endian modulus and exponent, as
/// carried in `ds:RSAKeyValue` elements.
pub fn load_rsa_public_from_components(
    modulus: &[u8],
    exponent: &[u8],
) -> Result<RsaPublicKey, Error> {
    RsaPublicKey::new(
        BigUint::from_bytes_be(modulus),
        BigUint::from_bytes_be(exponent),
    )
    .map_err(|e| Error::Key(format!("invalid RSA components: {e}")))
}

/// Hash an RSA public key according to EBICS 2.5 section 4.4.1.2.3.
///
/// The hash input is the lowercase hex exponent, a space, and the
/// lowercase hex modulus, each with leading zero digits stripped; the
/// digest is SHA-256.  Used both to verify HPB results and for the
/// printable key letter.
pub fn public_key_hash(key: &RsaPublicKey) -> Vec<u8> {
    let exp = trimmed_lower_hex(&key.e().to_bytes_be());
    let modulus = trimmed_lower_hex(&key.n().to_bytes_be());
    let mut hasher = Sha256::new();
    hasher.update(exp.as_bytes());
    hasher.update(b" ");
    hasher.update(modulus.as_bytes());
    hasher.finalize().to_vec()
}

/// Format a key hash for the out-of-band key letter: uppercase hex in
/// space-separated pairs, sixteen pairs per line.
pub fn format_key_letter_hash(hash: &[u8]) -> String {
    let mut out = String::new();
    for (i, b) in hash.iter().enumerate() {
        if i > 0 {
            out.push(if i % 16 == 0 { '\n' } else { ' ' });
        }
        out.push_str(&format!("{b:02X}"));
    }
    out
}

fn trimmed_lower_hex(bytes: &[u8]) -> String {
    let h = hex::encode(bytes);
    let trimmed = h.trim_start_matches('0');
    if trimmed.is_empty() { "0".to_owned() } else { trimmed.to_owned() }
}
