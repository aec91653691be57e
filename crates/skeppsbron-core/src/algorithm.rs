#![forbid(unsafe_code)]

//! Algorithm URI constants and EBICS version identifiers.
//!
//! EBICS pins one algorithm per concern; the URIs appear verbatim in
//! `Algorithm` attributes of outgoing documents and must match on the
//! way back in.

// ── XML-DSig (AuthSignature) ─────────────────────────────────────────

/// Canonical XML 1.0 (inclusive, without comments)
pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";

/// SHA-256 digest
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// RSA-SHA256 (PKCS#1 v1.5) signature
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// The single reference URI covering every `authenticate="true"` subtree.
pub const AUTHENTICATE_XPOINTER: &str = "#xpointer(//*[@authenticate='true'])";

// ── EBICS scheme versions ────────────────────────────────────────────

/// Protocol version carried in the `Version` attribute.
pub const PROTOCOL_VERSION: &str = "H004";

/// Protocol revision carried in the `Revision` attribute.
pub const PROTOCOL_REVISION: &str = "1";

/// Electronic signature scheme (RSASSA-PSS over the order digest).
pub const SIGNATURE_VERSION_A006: &str = "A006";

/// Identification and authentication scheme (AuthSignature key).
pub const AUTH_VERSION_X002: &str = "X002";

/// Envelope encryption scheme (AES-128-CBC + RSA key transport).
pub const ENCRYPTION_VERSION_E002: &str = "E002";

/// SecurityMedium value for software-held keys.
pub const SECURITY_MEDIUM: &str = "0000";
