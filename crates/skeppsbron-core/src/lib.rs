#![forbid(unsafe_code)]

//! Shared foundation of the Skeppsbron EBICS client engine: the error
//! taxonomy and the namespace/algorithm constants every other crate
//! builds on.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
