#![forbid(unsafe_code)]

//! XML namespace and element name constants for EBICS H004.

/// EBICS H004 namespace (requests, responses, HIA order data)
pub const EBICS_H004: &str = "urn:org:ebics:H004";

/// EBICS host-version (HEV) namespace
pub const EBICS_H000: &str = "http://www.ebics.org/H000";

/// EBICS signature order-data namespace (INI, user signature data)
pub const EBICS_S001: &str = "http://www.ebics.org/S001";

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // Envelope roots
    pub const EBICS_REQUEST: &str = "ebicsRequest";
    pub const EBICS_RESPONSE: &str = "ebicsResponse";
    pub const EBICS_UNSECURED_REQUEST: &str = "ebicsUnsecuredRequest";
    pub const EBICS_NO_PUB_KEY_DIGESTS_REQUEST: &str = "ebicsNoPubKeyDigestsRequest";
    pub const EBICS_KEY_MANAGEMENT_RESPONSE: &str = "ebicsKeyManagementResponse";
    pub const EBICS_HEV_REQUEST: &str = "ebicsHEVRequest";
    pub const EBICS_HEV_RESPONSE: &str = "ebicsHEVResponse";

    // Header structure
    pub const HEADER: &str = "header";
    pub const STATIC: &str = "static";
    pub const MUTABLE: &str = "mutable";
    pub const BODY: &str = "body";
    pub const HOST_ID: &str = "HostID";
    pub const NONCE: &str = "Nonce";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const PARTNER_ID: &str = "PartnerID";
    pub const USER_ID: &str = "UserID";
    pub const SYSTEM_ID: &str = "SystemID";
    pub const PRODUCT: &str = "Product";
    pub const ORDER_DETAILS: &str = "OrderDetails";
    pub const ORDER_TYPE: &str = "OrderType";
    pub const ORDER_ID: &str = "OrderID";
    pub const ORDER_ATTRIBUTE: &str = "OrderAttribute";
    pub const STANDARD_ORDER_PARAMS: &str = "StandardOrderParams";
    pub const GENERIC_ORDER_PARAMS: &str = "GenericOrderParams";
    pub const PARAMETER: &str = "Parameter";
    pub const NAME: &str = "Name";
    pub const VALUE: &str = "Value";
    pub const DATE_RANGE: &str = "DateRange";
    pub const START: &str = "Start";
    pub const END: &str = "End";
    pub const BANK_PUB_KEY_DIGESTS: &str = "BankPubKeyDigests";
    pub const AUTHENTICATION: &str = "Authentication";
    pub const ENCRYPTION: &str = "Encryption";
    pub const SECURITY_MEDIUM: &str = "SecurityMedium";
    pub const NUM_SEGMENTS: &str = "NumSegments";
    pub const TRANSACTION_ID: &str = "TransactionID";
    pub const TRANSACTION_PHASE: &str = "TransactionPhase";
    pub const SEGMENT_NUMBER: &str = "SegmentNumber";
    pub const RETURN_CODE: &str = "ReturnCode";
    pub const REPORT_TEXT: &str = "ReportText";

    // Body structure
    pub const AUTH_SIGNATURE: &str = "AuthSignature";
    pub const DATA_TRANSFER: &str = "DataTransfer";
    pub const ORDER_DATA: &str = "OrderData";
    pub const DATA_ENCRYPTION_INFO: &str = "DataEncryptionInfo";
    pub const ENCRYPTION_PUB_KEY_DIGEST: &str = "EncryptionPubKeyDigest";
    pub const TRANSACTION_KEY: &str = "TransactionKey";
    pub const SIGNATURE_DATA: &str = "SignatureData";
    pub const TRANSFER_RECEIPT: &str = "TransferReceipt";
    pub const RECEIPT_CODE: &str = "ReceiptCode";

    // HEV
    pub const SYSTEM_RETURN_CODE: &str = "SystemReturnCode";
    pub const VERSION_NUMBER: &str = "VersionNumber";

    // Key order data (INI/HIA/HPB)
    pub const SIGNATURE_PUB_KEY_ORDER_DATA: &str = "SignaturePubKeyOrderData";
    pub const SIGNATURE_PUB_KEY_INFO: &str = "SignaturePubKeyInfo";
    pub const SIGNATURE_VERSION: &str = "SignatureVersion";
    pub const HIA_REQUEST_ORDER_DATA: &str = "HIARequestOrderData";
    pub const HPB_RESPONSE_ORDER_DATA: &str = "HPBResponseOrderData";
    pub const AUTHENTICATION_PUB_KEY_INFO: &str = "AuthenticationPubKeyInfo";
    pub const AUTHENTICATION_VERSION: &str = "AuthenticationVersion";
    pub const ENCRYPTION_PUB_KEY_INFO: &str = "EncryptionPubKeyInfo";
    pub const ENCRYPTION_VERSION: &str = "EncryptionVersion";
    pub const PUB_KEY_VALUE: &str = "PubKeyValue";

    // User signature data (S001)
    pub const USER_SIGNATURE_DATA: &str = "UserSignatureData";
    pub const ORDER_SIGNATURE_DATA: &str = "OrderSignatureData";
    pub const SIGNATURE_VALUE_S001: &str = "SignatureValue";

    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const RSA_KEY_VALUE: &str = "RSAKeyValue";
    pub const RSA_MODULUS: &str = "Modulus";
    pub const RSA_EXPONENT: &str = "Exponent";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const AUTHENTICATE: &str = "authenticate";
    pub const VERSION: &str = "Version";
    pub const REVISION: &str = "Revision";
    pub const ALGORITHM: &str = "Algorithm";
    pub const URI: &str = "URI";
    pub const LAST_SEGMENT: &str = "lastSegment";
    pub const PROTOCOL_VERSION: &str = "ProtocolVersion";
}
