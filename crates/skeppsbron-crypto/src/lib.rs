#![forbid(unsafe_code)]

//! Cryptographic primitives of the Skeppsbron EBICS engine.
//!
//! Everything EBICS-specific about the crypto lives here: the key hash
//! format used for bank key verification, the A006 order signature
//! scheme, the E002 hybrid envelope and the passphrase protection used
//! for key backups.  The raw algorithms come from the RustCrypto crates.

pub mod a006;
pub mod backup;
pub mod e002;
pub mod keys;

pub use e002::EncryptedEnvelope;
