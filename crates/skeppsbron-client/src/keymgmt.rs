#![forbid(unsafe_code)]

//! Subscriber key management: INI/HIA submission and HPB key
//! acquisition.
//!
//! INI/HIA registration and HPB retrieval are independent bank-side
//! workflows that can be retried independently, so `connect` tolerates
//! partial completion across repeated calls and always returns a fresh
//! state snapshot for the caller to persist — shared state is never
//! mutated in place.

use skeppsbron_core::{Error, Result};
use skeppsbron_messages::request;
use skeppsbron_messages::response::{self, HevDetails, HpbResponseData, KeyManagementResponseContent};
use skeppsbron_messages::{EbicsKeyState, EbicsSubscriberState};

use crate::transport::{post_to_bank, EbicsTransport};

/// Result of a `connect` run: the new subscriber snapshot plus what was
/// actually performed, so callers (and tests) can observe idempotence.
pub struct ConnectOutcome {
    pub state: EbicsSubscriberState,
    pub performed_ini: bool,
    pub performed_hia: bool,
    pub fetched_bank_keys: bool,
}

/// Query the host's supported protocol versions (HEV).
pub async fn host_version_query(
    transport: &dyn EbicsTransport,
    ebics_url: &str,
    host_id: &str,
) -> Result<HevDetails> {
    let request = request::make_hev_request(host_id);
    let response_str = post_to_bank(transport, ebics_url, request).await?;
    response::parse_hev_response(&response_str)
}

/// Submit the signature key (INI).
pub async fn ini_request(
    transport: &dyn EbicsTransport,
    subscriber: &EbicsSubscriberState,
) -> Result<KeyManagementResponseContent> {
    let request = request::make_ini_request(subscriber)?;
    let response_str = post_to_bank(transport, &subscriber.ebics_url, request).await?;
    response::parse_key_management_response(subscriber, &response_str)
}

/// Submit the authentication and encryption keys (HIA).
pub async fn hia_request(
    transport: &dyn EbicsTransport,
    subscriber: &EbicsSubscriberState,
) -> Result<KeyManagementResponseContent> {
    let request = request::make_hia_request(subscriber)?;
    let response_str = post_to_bank(transport, &subscriber.ebics_url, request).await?;
    response::parse_key_management_response(subscriber, &response_str)
}

/// Fetch the bank's public keys (HPB).
pub async fn hpb_request(
    transport: &dyn EbicsTransport,
    subscriber: &EbicsSubscriberState,
) -> Result<HpbResponseData> {
    let request = request::make_hpb_request(subscriber)?;
    let response_str = post_to_bank(transport, &subscriber.ebics_url, request).await?;
    let content = response::parse_key_management_response(subscriber, &response_str)?;
    if !content.technical_return_code.is_ok() {
        return Err(content.technical_return_code.as_technical_error("HPB"));
    }
    if !content.bank_return_code.is_ok() {
        return Err(content.bank_return_code.as_bank_error());
    }
    let order_data = content
        .order_data
        .ok_or_else(|| Error::MissingElement("HPB response carries no order data".into()))?;
    response::parse_hpb_order_data(&order_data)
}

/// Bring a subscriber to the point where transactions can run.
///
/// Idempotent: once both bank keys are cached the call is a no-op, and
/// a state already `Sent` triggers no further INI/HIA requests.  The
/// final HPB attempt is best-effort; its failure never rolls back an
/// INI/HIA success.
pub async fn connect(
    transport: &dyn EbicsTransport,
    subscriber: &EbicsSubscriberState,
) -> Result<ConnectOutcome> {
    if subscriber.has_bank_keys() {
        return Ok(ConnectOutcome {
            state: subscriber.clone(),
            performed_ini: false,
            performed_hia: false,
            fetched_bank_keys: false,
        });
    }

    // When we do not know whether our keys were ever submitted, a
    // tentative HPB settles it: success means the bank knows us.
    if subscriber.ini_state == EbicsKeyState::Unknown
        || subscriber.hia_state == EbicsKeyState::Unknown
    {
        match hpb_request(transport, subscriber).await {
            Ok(hpb) => {
                tracing::info!("tentative HPB succeeded, subscriber already initialized");
                let state = subscriber
                    .with_key_states(EbicsKeyState::Sent, EbicsKeyState::Sent)
                    .with_bank_keys(hpb.authentication_pub_key, hpb.encryption_pub_key);
                return Ok(ConnectOutcome {
                    state,
                    performed_ini: false,
                    performed_hia: false,
                    fetched_bank_keys: true,
                });
            }
            Err(e) => tracing::info!(error = %e, "tentative HPB failed"),
        }
    }

    let (ini_done, performed_ini) = match subscriber.ini_state {
        EbicsKeyState::Sent => (true, false),
        EbicsKeyState::NotSent | EbicsKeyState::Unknown => {
            let resp = ini_request(transport, subscriber).await?;
            (
                resp.technical_return_code.is_ok() && resp.bank_return_code.is_ok(),
                true,
            )
        }
    };
    let (hia_done, performed_hia) = match subscriber.hia_state {
        EbicsKeyState::Sent => (true, false),
        EbicsKeyState::NotSent | EbicsKeyState::Unknown => {
            let resp = hia_request(transport, subscriber).await?;
            (
                resp.technical_return_code.is_ok() && resp.bank_return_code.is_ok(),
                true,
            )
        }
    };

    let hpb_data = match hpb_request(transport, subscriber).await {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!(error = %e, "HPB request failed");
            None
        }
    };

    let mut state = subscriber.with_key_states(
        if ini_done { EbicsKeyState::Sent } else { subscriber.ini_state },
        if hia_done { EbicsKeyState::Sent } else { subscriber.hia_state },
    );
    let fetched_bank_keys = hpb_data.is_some();
    if let Some(hpb) = hpb_data {
        state = state.with_bank_keys(hpb.authentication_pub_key, hpb.encryption_pub_key);
    }

    Ok(ConnectOutcome { state, performed_ini, performed_hia, fetched_bank_keys })
}
