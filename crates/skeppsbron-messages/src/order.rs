#![forbid(unsafe_code)]

//! Order-data compression, chunking and the small wire encodings
//! shared by request construction.

use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::RngCore;
use skeppsbron_core::Error;
use std::io::{Read, Write};

/// Maximum size of one transfer segment, counted over the base64 form.
pub const SEGMENT_LIMIT: usize = 1024 * 1024;

/// Zlib-deflate order data before encryption or embedding.
pub fn encode_order_data(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate received order data.
///
/// Reassembled-but-corrupt ciphertext surfaces here: the inflate stream
/// fails instead of silently yielding wrong bytes.
pub fn decode_order_data(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decryption(format!("order data inflate failed: {e}")))?;
    Ok(out)
}

/// Split an encrypted payload into base64 transfer segments of at most
/// [`SEGMENT_LIMIT`] characters each.
pub fn chunk_encrypted_payload(encrypted: &[u8]) -> Vec<String> {
    let b64 = base64::engine::general_purpose::STANDARD.encode(encrypted);
    if b64.is_empty() {
        return vec![String::new()];
    }
    b64.as_bytes()
        .chunks(SEGMENT_LIMIT)
        // Chunk boundaries fall on multiples of four, so every segment
        // is itself valid base64.
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

/// A 128-bit nonce in the uppercase hex form the schema expects.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}

/// Current UTC time in the ISO 8601 form used by `Timestamp` elements.
pub fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Format a date for `DateRange` boundaries.
pub fn format_date(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
