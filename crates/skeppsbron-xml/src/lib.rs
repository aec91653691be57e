#![forbid(unsafe_code)]

//! XML layer of the Skeppsbron EBICS engine.
//!
//! Parsing goes through roxmltree; outgoing documents are built with an
//! explicit ordered element tree ([`builder::Element`]) because EBICS
//! bank-side parsers are order-sensitive and the serialized form must be
//! deterministic.

pub mod builder;
pub mod document;
pub mod nodeset;

pub use builder::Element;
pub use document::XmlDocument;
pub use nodeset::NodeSet;
