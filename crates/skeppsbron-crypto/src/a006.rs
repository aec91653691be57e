#![forbid(unsafe_code)]

//! The EBICS A006 electronic signature scheme.
//!
//! Order data is digested first (skipping CR, LF and Ctrl-Z bytes, per
//! EBICS 2.5 appendix), then the 32-byte digest is signed with
//! RSASSA-PSS (SHA-256, MGF1-SHA256, 32-byte salt).  The PSS operation
//! hashes its input again; that double hashing is part of the scheme.

use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use signature::{RandomizedSigner, SignatureEncoding, Verifier};
use skeppsbron_core::Error;

/// Digest order data for A006: SHA-256 over the payload with `\r`,
/// `\n` and `0x1A` bytes removed.
pub fn digest_order_a006(order_data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for &b in order_data {
        match b {
            b'\r' | b'\n' | 0x1A => {}
            _ => hasher.update([b]),
        }
    }
    hasher.finalize().to_vec()
}

/// Sign an A006 order digest.
pub fn sign_a006(digest: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>, Error> {
    let mut rng = rand::thread_rng();
    let signing_key = rsa::pss::SigningKey::<Sha256>::new(private_key.clone());
    Ok(signing_key.sign_with_rng(&mut rng, digest).to_vec())
}

/// Verify an A006 signature over an order digest.
pub fn verify_a006(signature: &[u8], digest: &[u8], public_key: &RsaPublicKey) -> bool {
    let Ok(sig) = rsa::pss::Signature::try_from(signature) else {
        return false;
    };
    let verifying_key = rsa::pss::VerifyingKey::<Sha256>::new(public_key.clone());
    verifying_key.verify(digest, &sig).is_ok()
}
