#![forbid(unsafe_code)]

//! Persistence collaborator: a keyed record store.
//!
//! The engine reads subscriber key material and writes back updated
//! key state, received bank messages and prepared-payment submission
//! flags.  No core logic depends on the storage engine; the in-memory
//! implementation backs tests and the CLI's JSON file handling.

use skeppsbron_core::{Error, Result};
use skeppsbron_messages::EbicsSubscriberState;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A payment prepared for submission.
#[derive(Debug, Clone)]
pub struct PreparedPayment {
    pub payment_id: String,
    pub payload: Vec<u8>,
    pub submitted: bool,
}

/// Keyed record store the engine reads from and writes to.
pub trait NexusStore: Send + Sync {
    fn list_connections(&self) -> Result<Vec<String>>;
    fn load_subscriber(&self, connection_id: &str) -> Result<Option<EbicsSubscriberState>>;
    fn save_subscriber(&self, connection_id: &str, state: &EbicsSubscriberState) -> Result<()>;

    /// Record a downloaded bank message.  Returns `true` when stored,
    /// `false` when the message id was seen before (dedup no-op).
    fn record_bank_message(
        &self,
        connection_id: &str,
        message_id: &str,
        payload: &[u8],
    ) -> Result<bool>;

    fn add_prepared_payment(&self, connection_id: &str, payment: PreparedPayment) -> Result<()>;
    fn unsubmitted_payments(&self, connection_id: &str) -> Result<Vec<PreparedPayment>>;
    fn mark_payment_submitted(&self, connection_id: &str, payment_id: &str) -> Result<()>;
}

#[derive(Default)]
struct MemoryInner {
    subscribers: HashMap<String, EbicsSubscriberState>,
    message_ids: HashMap<String, HashSet<String>>,
    messages: HashMap<String, Vec<(String, Vec<u8>)>>,
    payments: HashMap<String, Vec<PreparedPayment>>,
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored messages for a connection (message id, payload).
    pub fn bank_messages(&self, connection_id: &str) -> Vec<(String, Vec<u8>)> {
        match lock(&self.inner) {
            Ok(inner) => inner.messages.get(connection_id).cloned().unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}

impl NexusStore for MemoryStore {
    fn list_connections(&self) -> Result<Vec<String>> {
        let inner = lock(&self.inner)?;
        let mut ids: Vec<String> = inner.subscribers.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn load_subscriber(&self, connection_id: &str) -> Result<Option<EbicsSubscriberState>> {
        Ok(lock(&self.inner)?.subscribers.get(connection_id).cloned())
    }

    fn save_subscriber(&self, connection_id: &str, state: &EbicsSubscriberState) -> Result<()> {
        lock(&self.inner)?
            .subscribers
            .insert(connection_id.to_owned(), state.clone());
        Ok(())
    }

    fn record_bank_message(
        &self,
        connection_id: &str,
        message_id: &str,
        payload: &[u8],
    ) -> Result<bool> {
        let mut inner = lock(&self.inner)?;
        let seen = inner.message_ids.entry(connection_id.to_owned()).or_default();
        if !seen.insert(message_id.to_owned()) {
            return Ok(false);
        }
        inner
            .messages
            .entry(connection_id.to_owned())
            .or_default()
            .push((message_id.to_owned(), payload.to_vec()));
        Ok(true)
    }

    fn add_prepared_payment(&self, connection_id: &str, payment: PreparedPayment) -> Result<()> {
        lock(&self.inner)?
            .payments
            .entry(connection_id.to_owned())
            .or_default()
            .push(payment);
        Ok(())
    }

    fn unsubmitted_payments(&self, connection_id: &str) -> Result<Vec<PreparedPayment>> {
        Ok(lock(&self.inner)?
            .payments
            .get(connection_id)
            .map(|list| list.iter().filter(|p| !p.submitted).cloned().collect())
            .unwrap_or_default())
    }

    fn mark_payment_submitted(&self, connection_id: &str, payment_id: &str) -> Result<()> {
        let mut inner = lock(&self.inner)?;
        let payments = inner
            .payments
            .get_mut(connection_id)
            .ok_or_else(|| Error::Store(format!("unknown connection: {connection_id}")))?;
        match payments.iter_mut().find(|p| p.payment_id == payment_id) {
            Some(p) => {
                p.submitted = true;
                Ok(())
            }
            None => Err(Error::Store(format!("unknown payment: {payment_id}"))),
        }
    }
}

fn lock(inner: &Mutex<MemoryInner>) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
    inner
        .lock()
        .map_err(|_| Error::Store("store lock poisoned".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skeppsbron_crypto::keys::generate_rsa_keypair;
    use skeppsbron_messages::EbicsKeyState;

    fn subscriber() -> EbicsSubscriberState {
        EbicsSubscriberState {
            ebics_url: "https://bank.example.com/ebicsweb".into(),
            host_id: "HOST01".into(),
            partner_id: "PARTNER1".into(),
            user_id: "USER1".into(),
            system_id: None,
            customer_sign_key: generate_rsa_keypair(2048).unwrap(),
            customer_auth_key: generate_rsa_keypair(2048).unwrap(),
            customer_enc_key: generate_rsa_keypair(2048).unwrap(),
            bank_auth_pub: None,
            bank_enc_pub: None,
            ini_state: EbicsKeyState::NotSent,
            hia_state: EbicsKeyState::NotSent,
        }
    }

    #[test]
    fn test_message_dedup_by_id() {
        let store = MemoryStore::new();
        assert!(store.record_bank_message("conn", "msg-001", b"camt").unwrap());
        // Re-recording the same message id is a no-op.
        assert!(!store.record_bank_message("conn", "msg-001", b"camt").unwrap());
        assert_eq!(store.bank_messages("conn").len(), 1);

        // Different connections dedup independently.
        assert!(store.record_bank_message("other", "msg-001", b"camt").unwrap());
    }

    #[test]
    fn test_subscriber_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load_subscriber("conn").unwrap().is_none());
        store.save_subscriber("conn", &subscriber()).unwrap();
        let loaded = store.load_subscriber("conn").unwrap().unwrap();
        assert_eq!(loaded.host_id, "HOST01");
        assert_eq!(store.list_connections().unwrap(), vec!["conn"]);
    }

    #[test]
    fn test_payment_submission_flags() {
        let store = MemoryStore::new();
        store
            .add_prepared_payment(
                "conn",
                PreparedPayment {
                    payment_id: "pay-1".into(),
                    payload: b"<pain.001/>".to_vec(),
                    submitted: false,
                },
            )
            .unwrap();
        assert_eq!(store.unsubmitted_payments("conn").unwrap().len(), 1);
        store.mark_payment_submitted("conn", "pay-1").unwrap();
        assert!(store.unsubmitted_payments("conn").unwrap().is_empty());
        assert!(store.mark_payment_submitted("conn", "pay-9").is_err());
    }
}
