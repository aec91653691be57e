#![forbid(unsafe_code)]

//! The EBICS transaction engine.
//!
//! Each conversation is a strictly sequential exchange: initialization,
//! transfer loop, then (for downloads) a receipt.  Every phase depends
//! on the response to the prior one, so the engine never pipelines.
//! The technical return code is evaluated before the bank return code
//! in every phase — a technical failure means the message was not
//! processed at all, and the bank code is then meaningless.

use skeppsbron_core::{Error, Result};
use skeppsbron_messages::request::{self, OrderParams};
use skeppsbron_messages::response::{self, EbicsResponseContent};
use skeppsbron_messages::{EbicsReturnCode, EbicsSubscriberState};

use crate::transport::{post_to_bank, EbicsTransport};

/// Result of a download conversation.
///
/// A bank-side rejection is a distinct outcome, not an error bubbling
/// up: callers decide whether to retry later, and operators can tell
/// "bank rejected this order" from "something is broken".
#[derive(Debug)]
pub enum DownloadOutcome {
    Success(Vec<u8>),
    BankError(EbicsReturnCode),
}

/// Result of an upload conversation.
#[derive(Debug)]
pub enum UploadOutcome {
    Success,
    BankError(EbicsReturnCode),
}

/// Run a complete download transaction (init, transfer 2..=N, receipt).
pub async fn download_transaction(
    transport: &dyn EbicsTransport,
    subscriber: &EbicsSubscriberState,
    order_type: &str,
    order_params: &OrderParams,
) -> Result<DownloadOutcome> {
    // Initialization phase.
    let init_request = request::make_download_init_request(subscriber, order_type, order_params)?;
    let init_response_str = post_to_bank(transport, &subscriber.ebics_url, init_request).await?;
    let init_response = response::parse_and_validate_response(subscriber, &init_response_str)?;

    check_technical(&init_response, "download initialization")?;
    if !init_response.bank_return_code.is_ok() {
        tracing::warn!(code = %init_response.bank_return_code, "bank rejected download init");
        return Ok(DownloadOutcome::BankError(init_response.bank_return_code));
    }

    let transaction_id = init_response.transaction_id.clone().ok_or_else(|| {
        missing_field(&init_response, "initial response must contain a transaction ID")
    })?;
    let encryption_info = init_response.data_encryption_info.clone().ok_or_else(|| {
        missing_field(&init_response, "initial response did not contain encryption info")
    })?;
    let num_segments = init_response.num_segments.ok_or_else(|| {
        missing_field(&init_response, "initial response did not contain the segment count")
    })?;
    let first_chunk = init_response.order_data_enc_chunk.clone().ok_or_else(|| {
        missing_field(&init_response, "initial response did not contain a data transfer")
    })?;

    // Transfer phase: segment 1 came with the init response; fetch
    // 2..=N strictly in ascending order.
    let mut payload_chunks = Vec::with_capacity(num_segments as usize);
    payload_chunks.push(first_chunk);
    for segment in 2..=num_segments {
        let transfer_request = request::make_download_transfer_request(
            subscriber,
            &transaction_id,
            segment,
            num_segments,
        )?;
        let transfer_response_str =
            post_to_bank(transport, &subscriber.ebics_url, transfer_request).await?;
        let transfer_response =
            response::parse_and_validate_response(subscriber, &transfer_response_str)?;

        check_technical(&transfer_response, "download transfer")?;
        if !transfer_response.bank_return_code.is_ok() {
            tracing::warn!(
                code = %transfer_response.bank_return_code,
                segment,
                "bank rejected download transfer"
            );
            return Ok(DownloadOutcome::BankError(transfer_response.bank_return_code));
        }
        let chunk = transfer_response.order_data_enc_chunk.clone().ok_or_else(|| {
            missing_field(&transfer_response, "transfer response did not contain a data transfer")
        })?;
        payload_chunks.push(chunk);
    }

    let payload =
        response::decrypt_and_decompress(subscriber, &encryption_info, &payload_chunks)?;

    // Receipt phase: the only acceptable technical code here is
    // "download postprocess done".
    let receipt_request = request::make_download_receipt_request(subscriber, &transaction_id)?;
    let receipt_response_str =
        post_to_bank(transport, &subscriber.ebics_url, receipt_request).await?;
    let receipt_response =
        response::parse_and_validate_response(subscriber, &receipt_response_str)?;
    if receipt_response.technical_return_code != EbicsReturnCode::DownloadPostprocessDone {
        return Err(receipt_response
            .technical_return_code
            .as_technical_error("download receipt"));
    }

    Ok(DownloadOutcome::Success(payload))
}

/// Run a complete upload transaction (init, then one transfer per
/// payload segment).
pub async fn upload_transaction(
    transport: &dyn EbicsTransport,
    subscriber: &EbicsSubscriberState,
    order_type: &str,
    order_params: &OrderParams,
    payload: &[u8],
) -> Result<UploadOutcome> {
    // Fails fast with a KeyState error when HPB has not run yet.
    let prepared = request::prepare_upload_payload(subscriber, payload)?;

    let init_request =
        request::make_upload_init_request(subscriber, order_type, order_params, &prepared)?;
    let init_response_str = post_to_bank(transport, &subscriber.ebics_url, init_request).await?;
    let init_response = response::parse_and_validate_response(subscriber, &init_response_str)?;

    check_technical(&init_response, "upload initialization")?;
    if !init_response.bank_return_code.is_ok() {
        tracing::warn!(code = %init_response.bank_return_code, "bank rejected upload init");
        return Ok(UploadOutcome::BankError(init_response.bank_return_code));
    }
    let transaction_id = init_response.transaction_id.clone().ok_or_else(|| {
        missing_field(&init_response, "upload init response must contain a transaction ID")
    })?;
    tracing::debug!(%transaction_id, "upload initialization accepted");

    for segment in 1..=prepared.num_segments() as u32 {
        let transfer_request = request::make_upload_transfer_request(
            subscriber,
            &transaction_id,
            &prepared,
            segment,
        )?;
        let transfer_response_str =
            post_to_bank(transport, &subscriber.ebics_url, transfer_request).await?;
        let transfer_response =
            response::parse_and_validate_response(subscriber, &transfer_response_str)?;

        check_technical(&transfer_response, "upload transfer")?;
        if !transfer_response.bank_return_code.is_ok() {
            tracing::warn!(
                code = %transfer_response.bank_return_code,
                segment,
                "bank rejected upload transfer"
            );
            return Ok(UploadOutcome::BankError(transfer_response.bank_return_code));
        }
    }

    Ok(UploadOutcome::Success)
}

/// Technical code gate, evaluated before the bank code in every phase.
fn check_technical(content: &EbicsResponseContent, phase: &str) -> Result<()> {
    if content.technical_return_code.is_ok() {
        Ok(())
    } else {
        Err(content.technical_return_code.as_technical_error(phase))
    }
}

/// A required field absent from a technically-OK response is still a
/// protocol-level failure.
fn missing_field(content: &EbicsResponseContent, reason: &str) -> Error {
    Error::TechnicalProtocol {
        code: content.technical_return_code.code().to_owned(),
        reason: reason.to_owned(),
    }
}
