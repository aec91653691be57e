#![forbid(unsafe_code)]

/// Errors produced by the Skeppsbron EBICS engine.
///
/// The protocol-facing variants follow a strict classification: parsing
/// and signature failures always abort the current transaction, while
/// `BankBusiness` and `UnreachableBank` are the only kinds a scheduler
/// is expected to retry later.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("outgoing document failed validation: {0}")]
    Validation(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("digest mismatch over authenticated content")]
    DigestMismatch,

    #[error("EBICS technical error {code}: {reason}")]
    TechnicalProtocol { code: String, reason: String },

    #[error("EBICS bank-business error {code}")]
    BankBusiness { code: String },

    #[error("bank unreachable: {0}")]
    UnreachableBank(String),

    #[error("invalid subscriber state: {0}")]
    KeyState(String),

    #[error("bad backup: passphrase does not match")]
    BackupPassphrase,

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a scheduler may retry the failed operation later.
    ///
    /// Only bank-business rejections and transport failures qualify;
    /// everything else indicates a broken message or broken local state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BankBusiness { .. } | Self::UnreachableBank(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::BankBusiness { code: "091116".into() }.is_retryable());
        assert!(Error::UnreachableBank("connection refused".into()).is_retryable());
        assert!(!Error::SignatureInvalid("bad".into()).is_retryable());
        assert!(!Error::TechnicalProtocol { code: "091002".into(), reason: "state".into() }
            .is_retryable());
        assert!(!Error::KeyState("no bank keys".into()).is_retryable());
    }
}
