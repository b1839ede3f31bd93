// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Watermark payload serialization and compression.
//!
//! The payload is what gets encrypted. Layout:
//!
//! ```text
//! [1 byte ] flags
//! [M bytes] body (raw or Brotli-compressed depending on flags)
//! ```
//!
//! The body, after decompression:
//!
//! ```text
//! [1 byte ] format version
//! [1 byte ] method tag
//! [1 byte ] strength used at embed time
//! [8 bytes] created_at, Unix milliseconds (i64 BE)
//! [4 bytes] image width (u32 BE)
//! [4 bytes] image height (u32 BE)
//! [N bytes] owner text (UTF-8)
//! ```

use std::io::{Read, Write};

use chrono::{DateTime, TimeZone, Utc};

use crate::watermark::error::WatermarkError;
use crate::watermark::method::Method;

/// Compression algorithm flags (bits 0-1 of the flags byte).
const COMPRESS_NONE: u8 = 0b00;
const COMPRESS_BROTLI: u8 = 0b01;
const COMPRESS_MASK: u8 = 0b11;

const BROTLI_QUALITY: u32 = 11;
const BROTLI_LG_WINDOW_SIZE: u32 = 22;

const FORMAT_VERSION: u8 = 1;

/// Fixed part of the body before the owner text.
const BODY_HEADER_LEN: usize = 1 + 1 + 1 + 8 + 4 + 4;

/// Serialized bytes around the owner text when stored uncompressed.
pub const PAYLOAD_OVERHEAD: usize = 1 + BODY_HEADER_LEN;

/// Maximum owner text length accepted for embedding.
pub const MAX_OWNER_TEXT_BYTES: usize = 16 * 1024;

/// Decompression cap, well above any legitimate body.
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Owner metadata carried inside a watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WatermarkPayload {
    pub owner_text: String,
    pub created_at: DateTime<Utc>,
    pub method: Method,
    /// Strength the watermark was embedded with.
    pub strength: u8,
    /// Dimensions of the image at embed time.
    pub width: u32,
    pub height: u32,
}

impl WatermarkPayload {
    /// Fresh payload stamped with the current time.
    pub fn new(owner_text: impl Into<String>, method: Method, strength: u8, width: u32, height: u32) -> Self {
        Self {
            owner_text: owner_text.into(),
            created_at: now_millis(),
            method,
            strength,
            width,
            height,
        }
    }
}

/// Current time truncated to whole milliseconds, the stored precision.
fn now_millis() -> DateTime<Utc> {
    let ms = Utc::now().timestamp_millis();
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Serialize a payload into `[flags][body]`, compressing when it helps.
///
/// # Errors
/// [`WatermarkError::MessageTooLarge`] if the owner text exceeds
/// [`MAX_OWNER_TEXT_BYTES`].
pub fn encode_payload(payload: &WatermarkPayload) -> Result<Vec<u8>, WatermarkError> {
    if payload.owner_text.len() > MAX_OWNER_TEXT_BYTES {
        return Err(WatermarkError::MessageTooLarge);
    }
    let body = serialize_body(payload);
    try_compress(&body)
}

/// Size [`encode_payload`] would produce for the same input.
pub fn encoded_payload_size(payload: &WatermarkPayload) -> usize {
    encode_payload(payload)
        .map(|v| v.len())
        .unwrap_or(PAYLOAD_OVERHEAD + payload.owner_text.len())
}

/// Parse decrypted bytes produced by [`encode_payload`].
///
/// # Errors
/// [`WatermarkError::DecodeFailure`] for unknown flags, versions, method tags,
/// truncated bodies or non-UTF-8 owner text.
pub fn decode_payload(data: &[u8]) -> Result<WatermarkPayload, WatermarkError> {
    let (&flags, rest) = data.split_first().ok_or(WatermarkError::DecodeFailure)?;
    let body = match flags & COMPRESS_MASK {
        COMPRESS_NONE => rest.to_vec(),
        COMPRESS_BROTLI => decompress_brotli(rest)?,
        _ => return Err(WatermarkError::DecodeFailure),
    };
    parse_body(&body)
}

fn serialize_body(payload: &WatermarkPayload) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BODY_HEADER_LEN + payload.owner_text.len());
    buf.push(FORMAT_VERSION);
    buf.push(payload.method.tag());
    buf.push(payload.strength);
    buf.extend_from_slice(&payload.created_at.timestamp_millis().to_be_bytes());
    buf.extend_from_slice(&payload.width.to_be_bytes());
    buf.extend_from_slice(&payload.height.to_be_bytes());
    buf.extend_from_slice(payload.owner_text.as_bytes());
    buf
}

fn parse_body(body: &[u8]) -> Result<WatermarkPayload, WatermarkError> {
    if body.len() < BODY_HEADER_LEN || body[0] != FORMAT_VERSION {
        return Err(WatermarkError::DecodeFailure);
    }
    let method = Method::from_tag(body[1]).ok_or(WatermarkError::DecodeFailure)?;
    let strength = body[2];
    let ms = i64::from_be_bytes(read_array(&body[3..11])?);
    let created_at = Utc
        .timestamp_millis_opt(ms)
        .single()
        .ok_or(WatermarkError::DecodeFailure)?;
    let width = u32::from_be_bytes(read_array(&body[11..15])?);
    let height = u32::from_be_bytes(read_array(&body[15..19])?);
    let owner_text = std::str::from_utf8(&body[BODY_HEADER_LEN..])
        .map_err(|_| WatermarkError::DecodeFailure)?
        .to_string();

    Ok(WatermarkPayload { owner_text, created_at, method, strength, width, height })
}

fn read_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], WatermarkError> {
    bytes.try_into().map_err(|_| WatermarkError::DecodeFailure)
}

/// Return `[flags][data]` using whichever of raw/Brotli is smaller.
fn try_compress(body: &[u8]) -> Result<Vec<u8>, WatermarkError> {
    let compressed = compress_brotli(body)?;
    let (flag, data) = if compressed.len() < body.len() {
        (COMPRESS_BROTLI, compressed.as_slice())
    } else {
        (COMPRESS_NONE, body)
    };
    let mut out = Vec::with_capacity(1 + data.len());
    out.push(flag);
    out.extend_from_slice(data);
    Ok(out)
}

fn compress_brotli(data: &[u8]) -> Result<Vec<u8>, WatermarkError> {
    let mut output = Vec::new();
    {
        let mut compressor =
            brotli::CompressorWriter::new(&mut output, 4096, BROTLI_QUALITY, BROTLI_LG_WINDOW_SIZE);
        compressor
            .write_all(data)
            .map_err(|_| WatermarkError::MessageTooLarge)?;
        // CompressorWriter flushes on drop
    }
    Ok(output)
}

fn decompress_brotli(data: &[u8]) -> Result<Vec<u8>, WatermarkError> {
    let mut output = Vec::new();
    brotli::Decompressor::new(data, 4096)
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut output)
        .map_err(|_| WatermarkError::DecodeFailure)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str) -> WatermarkPayload {
        WatermarkPayload {
            owner_text: text.to_string(),
            created_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            method: Method::RedundantBitPlane,
            strength: 50,
            width: 512,
            height: 384,
        }
    }

    #[test]
    fn roundtrip_short_text() {
        let p = sample("© A");
        let bytes = encode_payload(&p).unwrap();
        assert_eq!(decode_payload(&bytes).unwrap(), p);
    }

    #[test]
    fn roundtrip_empty_text() {
        let p = sample("");
        assert_eq!(decode_payload(&encode_payload(&p).unwrap()).unwrap(), p);
    }

    #[test]
    fn repetitive_text_gets_compressed() {
        let p = sample(&"all rights reserved ".repeat(40));
        let bytes = encode_payload(&p).unwrap();
        assert_eq!(bytes[0] & COMPRESS_MASK, COMPRESS_BROTLI);
        assert!(bytes.len() < p.owner_text.len());
        assert_eq!(decode_payload(&bytes).unwrap(), p);
    }

    #[test]
    fn short_text_stays_raw() {
        let bytes = encode_payload(&sample("x")).unwrap();
        assert_eq!(bytes[0] & COMPRESS_MASK, COMPRESS_NONE);
        assert_eq!(bytes.len(), PAYLOAD_OVERHEAD + 1);
    }

    #[test]
    fn oversized_text_rejected() {
        let p = sample(&"a".repeat(MAX_OWNER_TEXT_BYTES + 1));
        assert!(matches!(encode_payload(&p), Err(WatermarkError::MessageTooLarge)));
    }

    #[test]
    fn garbage_rejected() {
        assert!(decode_payload(&[]).is_err());
        assert!(decode_payload(&[0x00, 0x01]).is_err());
        assert!(decode_payload(&[0x03, 0x00]).is_err());
        let mut bytes = encode_payload(&sample("abc")).unwrap();
        bytes[2] = 0xEE; // method tag
        assert!(matches!(decode_payload(&bytes), Err(WatermarkError::DecodeFailure)));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut bytes = encode_payload(&sample("ab")).unwrap();
        let last = bytes.len() - 1;
        bytes[last] = 0xFF;
        assert!(matches!(decode_payload(&bytes), Err(WatermarkError::DecodeFailure)));
    }

    #[test]
    fn new_truncates_to_millis() {
        let p = WatermarkPayload::new("x", Method::BitPlane, 10, 1, 1);
        assert_eq!(p.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
        assert_eq!(decode_payload(&encode_payload(&p).unwrap()).unwrap(), p);
    }
}
