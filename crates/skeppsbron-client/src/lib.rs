#![forbid(unsafe_code)]

//! EBICS client engine: drives the multi-phase conversations against a
//! bank host, tracks subscriber key state, and schedules background
//! sweeps over many independent bank connections.
//!
//! Per-transaction state (transaction id, segment buffers, partial
//! ciphertext) lives on the stack of one conversation and is never
//! shared; a subscriber runs at most one transaction at a time against
//! a host, while different subscribers proceed concurrently.

pub mod backup;
pub mod keymgmt;
pub mod scheduler;
pub mod store;
pub mod transaction;
pub mod transport;

pub use keymgmt::{connect, ConnectOutcome};
pub use scheduler::{Scheduler, SweepOutcome, SweepReport};
pub use store::{MemoryStore, NexusStore, PreparedPayment};
pub use transaction::{download_transaction, upload_transaction, DownloadOutcome, UploadOutcome};
pub use transport::{EbicsTransport, HttpTransport};

#[cfg(test)]
mod testbank;
