#![forbid(unsafe_code)]

//! Typed EBICS H004 message model.
//!
//! One construction function per request kind and one parser per
//! response kind, all honoring the schema's strict element ordering.
//! Requests serialize through the ordered element builder; responses
//! are parsed by namespace-aware lookup, so a syntactically valid but
//! business-errored response is distinguishable from a structurally
//! invalid one.

pub mod order;
pub mod request;
pub mod response;
pub mod retcode;
pub mod subscriber;
pub mod validate;

pub use request::{OrderParams, PreparedUploadData};
pub use response::{DataEncryptionInfo, EbicsResponseContent, KeyManagementResponseContent};
pub use retcode::EbicsReturnCode;
pub use subscriber::{EbicsKeyState, EbicsSubscriberState};
