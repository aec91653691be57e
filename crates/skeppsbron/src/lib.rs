#![forbid(unsafe_code)]

pub use skeppsbron_c14n as c14n;
pub use skeppsbron_client as client;
pub use skeppsbron_core as core;
pub use skeppsbron_crypto as crypto;
pub use skeppsbron_dsig as dsig;
pub use skeppsbron_messages as messages;
pub use skeppsbron_xml as xml;
