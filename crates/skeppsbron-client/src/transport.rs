#![forbid(unsafe_code)]

//! Outbound HTTP transport.
//!
//! The engine never manages connections itself; it posts one XML body
//! and reads one XML body back through this trait.  Transport-level
//! failures (refused, timed out, 5xx) are classified `UnreachableBank`
//! so sweeps can retry later without reporting a false rejection.

use async_trait::async_trait;
use skeppsbron_core::{Error, Result};
use skeppsbron_messages::validate;
use std::time::Duration;

/// A pluggable transport capable of POSTing a body to a bank URL.
#[async_trait]
pub trait EbicsTransport: Send + Sync {
    async fn post(&self, url: &str, body: String) -> Result<String>;
}

/// Validate and send an outgoing document.
///
/// Outbound validation is a hard gate: a document that fails the
/// structural check never reaches the wire.
pub async fn post_to_bank(
    transport: &dyn EbicsTransport,
    url: &str,
    body: String,
) -> Result<String> {
    validate::validate_outgoing(&body)?;
    tracing::debug!(url, body = %body, "posting to bank");
    let response = transport.post(url, body).await?;
    tracing::debug!(response = %response, "received from bank");
    Ok(response)
}

/// reqwest-backed transport with a per-request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("HTTP client setup failed: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EbicsTransport for HttpTransport {
    async fn post(&self, url: &str, body: String) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnreachableBank(format!("bank returned HTTP {status}")));
        }
        response.text().await.map_err(classify)
    }
}

fn classify(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::UnreachableBank("request timed out".into())
    } else {
        Error::UnreachableBank(e.to_string())
    }
}
