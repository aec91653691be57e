#![forbid(unsafe_code)]

//! Background sweeps over all bank connections.
//!
//! Each connection is an isolated work item dispatched through a
//! bounded task pool: one subscriber's failure is logged and reported
//! in the sweep summary, never propagated to its siblings.  Decrypted
//! order data is handed straight to the store; nothing is cached
//! across transactions.

use skeppsbron_core::{Error, Result};
use skeppsbron_messages::request::OrderParams;
use skeppsbron_messages::EbicsSubscriberState;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::store::NexusStore;
use crate::transaction::{self, DownloadOutcome, UploadOutcome};
use crate::transport::EbicsTransport;

/// Result of one connection's work item within a sweep.
pub struct SweepOutcome {
    pub connection_id: String,
    /// Number of records affected (messages stored, payments submitted).
    pub result: Result<u32>,
}

/// Summary of one sweep run.
pub struct SweepReport {
    pub outcomes: Vec<SweepOutcome>,
}

impl SweepReport {
    pub fn failed(&self) -> impl Iterator<Item = &SweepOutcome> + '_ {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Dispatches per-connection work items with bounded concurrency.
pub struct Scheduler {
    store: Arc<dyn NexusStore>,
    transport: Arc<dyn EbicsTransport>,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn NexusStore>,
        transport: Arc<dyn EbicsTransport>,
        concurrency: usize,
    ) -> Self {
        Self { store, transport, concurrency: concurrency.max(1) }
    }

    /// Fetch the latest statements for every connection and record the
    /// resulting bank messages, deduplicated by message id.
    pub async fn fetch_statements_sweep(
        &self,
        order_type: &str,
        order_params: &OrderParams,
    ) -> SweepReport {
        let order_type = order_type.to_owned();
        let order_params = order_params.clone();
        self.run_sweep(move |connection_id, subscriber, store, transport| {
            let order_type = order_type.clone();
            let order_params = order_params.clone();
            async move {
                let outcome = transaction::download_transaction(
                    transport.as_ref(),
                    &subscriber,
                    &order_type,
                    &order_params,
                )
                .await?;
                match outcome {
                    DownloadOutcome::BankError(code) => Err(code.as_bank_error()),
                    DownloadOutcome::Success(payload) => {
                        let message_id = extract_message_id(&payload);
                        let inserted =
                            store.record_bank_message(&connection_id, &message_id, &payload)?;
                        if !inserted {
                            tracing::debug!(%message_id, "bank message already recorded");
                        }
                        Ok(u32::from(inserted))
                    }
                }
            }
        })
        .await
    }

    /// Submit every unsubmitted prepared payment of every connection.
    pub async fn submit_payments_sweep(&self) -> SweepReport {
        self.run_sweep(|connection_id, subscriber, store, transport| async move {
            let mut submitted = 0u32;
            for payment in store.unsubmitted_payments(&connection_id)? {
                let outcome = transaction::upload_transaction(
                    transport.as_ref(),
                    &subscriber,
                    "CCT",
                    &OrderParams::Standard,
                    &payment.payload,
                )
                .await?;
                match outcome {
                    UploadOutcome::Success => {
                        store.mark_payment_submitted(&connection_id, &payment.payment_id)?;
                        submitted += 1;
                    }
                    UploadOutcome::BankError(code) => {
                        // Leave the payment unsubmitted for a later sweep.
                        tracing::warn!(
                            payment = %payment.payment_id,
                            %code,
                            "bank rejected payment submission"
                        );
                    }
                }
            }
            Ok(submitted)
        })
        .await
    }

    async fn run_sweep<F, Fut>(&self, work: F) -> SweepReport
    where
        F: Fn(String, EbicsSubscriberState, Arc<dyn NexusStore>, Arc<dyn EbicsTransport>) -> Fut,
        Fut: std::future::Future<Output = Result<u32>> + Send + 'static,
    {
        let connections = match self.store.list_connections() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "cannot enumerate connections");
                return SweepReport { outcomes: Vec::new() };
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<SweepOutcome> = JoinSet::new();

        for connection_id in connections {
            let subscriber = match self.store.load_subscriber(&connection_id) {
                Ok(Some(sub)) => sub,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(connection = %connection_id, error = %e, "load failed");
                    continue;
                }
            };
            let semaphore = semaphore.clone();
            let future = work(
                connection_id.clone(),
                subscriber,
                self.store.clone(),
                self.transport.clone(),
            );
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = future.await;
                if let Err(e) = &result {
                    tracing::warn!(connection = %connection_id, error = %e, "sweep item failed");
                }
                SweepOutcome { connection_id, result }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(SweepOutcome {
                    connection_id: "<panicked>".into(),
                    result: Err(Error::Other(format!("sweep task panicked: {e}"))),
                }),
            }
        }
        outcomes.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));
        SweepReport { outcomes }
    }
}

/// Message id of a downloaded bank document.
///
/// The business fields of camt documents are out of scope here; the
/// dedup key is the first `MsgId` element when present, otherwise a
/// digest of the payload.
pub fn extract_message_id(payload: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(payload) {
        if let Ok(doc) = roxmltree::Document::parse(text) {
            if let Some(node) = doc
                .descendants()
                .find(|n| n.is_element() && n.tag_name().name() == "MsgId")
            {
                let id = node.text().unwrap_or("").trim();
                if !id.is_empty() {
                    return id.to_owned();
                }
            }
        }
    }
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(payload))
}
