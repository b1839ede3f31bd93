// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Payload codec: serialize → encrypt → frame → repeat, and back.
//!
//! Decoding never raises: every way a bitstream can fail to be our watermark
//! maps to a [`FailureReason`], checked in this order:
//!
//! 1. header implausible or CRC mismatch → `NoWatermarkFound`
//! 2. declared length past the available bits → `DecodeFailure`
//! 3. verification tag differs from the caller's → `KeyMismatch`
//! 4. AEAD authentication fails → `AuthenticationFailed`
//! 5. plaintext does not parse → `DecodeFailure`

use crate::watermark::crypto::{self, KeyMaterial};
use crate::watermark::error::{FailureReason, WatermarkError};
use crate::watermark::frame::{self, FRAME_OVERHEAD, MAX_CIPHERTEXT_LEN};
use crate::watermark::payload::{self, WatermarkPayload};
use crate::watermark::repetition;

/// A successfully decoded watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub payload: WatermarkPayload,
    /// Share of repeated copies that agreed with the vote, in percent.
    /// Always 100 without redundancy.
    pub integrity_percent: u8,
}

/// Encrypt and frame a payload, returning the frame bytes.
///
/// # Errors
/// [`WatermarkError::MessageTooLarge`] if the serialized payload exceeds the
/// frame's length limit.
pub fn encode_frame(payload: &WatermarkPayload, keys: &KeyMaterial) -> Result<Vec<u8>, WatermarkError> {
    let plaintext = payload::encode_payload(payload)?;
    if plaintext.len() > MAX_CIPHERTEXT_LEN {
        return Err(WatermarkError::MessageTooLarge);
    }
    // AES-GCM-SIV ciphertext length equals plaintext length.
    let aad = frame::associated_data(&keys.tag, plaintext.len() as u32);
    let (sealed, nonce) = crypto::encrypt(&plaintext, keys, &aad)?;
    Ok(frame::build_frame(&keys.tag, &nonce, &sealed))
}

/// Encode a payload into the bitstream a pixel-domain method writes.
///
/// With `redundancy > 1` every frame bit is repeated contiguously.
pub fn encode(
    payload: &WatermarkPayload,
    keys: &KeyMaterial,
    redundancy: usize,
) -> Result<Vec<u8>, WatermarkError> {
    let frame_bytes = encode_frame(payload, keys)?;
    Ok(frame_to_bits(&frame_bytes, redundancy))
}

/// Expand frame bytes into the carrier bitstream, repeating every bit
/// `redundancy` times.
pub fn frame_to_bits(frame_bytes: &[u8], redundancy: usize) -> Vec<u8> {
    repetition::repeat_bits(&frame::bytes_to_bits(frame_bytes), redundancy)
}

/// Number of carrier bits [`encode`] would emit for `payload`.
pub fn encoded_bit_len(payload: &WatermarkPayload, redundancy: usize) -> usize {
    frame_bit_len(payload::encoded_payload_size(payload), redundancy)
}

/// Carrier bits needed for a plaintext of `plaintext_len` bytes.
pub fn frame_bit_len(plaintext_len: usize, redundancy: usize) -> usize {
    (FRAME_OVERHEAD + plaintext_len) * 8 * redundancy.max(1)
}

/// Decode a carrier bitstream read back by a pixel-domain method.
///
/// `bits` may be longer than the frame; trailing bits are ignored.
pub fn decode(bits: &[u8], keys: &KeyMaterial, redundancy: usize) -> Result<Decoded, FailureReason> {
    let r = redundancy.max(1);
    let voted = repetition::majority_decode(bits, r);
    let whole = voted.len() / 8 * 8;
    let bytes = frame::bits_to_bytes(&voted[..whole]);

    let ct_len = frame::peek_length(&bytes)?;
    let payload = decode_frame(&bytes, keys)?;

    let used = (frame::frame_len(ct_len) * 8 * r).min(bits.len());
    let integrity_percent = (repetition::agreement(&bits[..used], r) * 100.0).round() as u8;
    Ok(Decoded { payload, integrity_percent })
}

/// Decode raw frame bytes (the metadata-tag path has no bit layer).
pub fn decode_frame(bytes: &[u8], keys: &KeyMaterial) -> Result<WatermarkPayload, FailureReason> {
    let parsed = frame::parse_frame(bytes)?;
    if parsed.tag != keys.tag {
        return Err(FailureReason::KeyMismatch);
    }
    let aad = frame::associated_data(&parsed.tag, parsed.length());
    let plaintext = crypto::decrypt(&parsed.sealed(), keys, &parsed.nonce, &aad)
        .map_err(|_| FailureReason::AuthenticationFailed)?;
    payload::decode_payload(&plaintext).map_err(|_| FailureReason::DecodeFailure)
}
