// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Encrypted frame construction and parsing.
//!
//! The frame is the binary container every method carries:
//!
//! ```text
//! [2 bytes ] key verification tag
//! [4 bytes ] ciphertext length N (big-endian u32)
//! [12 bytes] AES-GCM-SIV nonce
//! [N bytes ] ciphertext
//! [16 bytes] authentication tag
//! [4 bytes ] CRC-32 of everything above
//! ```
//!
//! Total frame size = 38 + N bytes. The tag and length are bound to the
//! ciphertext as AEAD associated data.

use crate::watermark::crypto::{KeyVerificationTag, AUTH_TAG_LEN, NONCE_LEN, TAG_LEN};
use crate::watermark::error::FailureReason;

/// Bytes before the nonce: tag + length.
pub const HEADER_LEN: usize = TAG_LEN + 4;

/// Fixed overhead: header(6) + nonce(12) + auth tag(16) + crc(4) = 38 bytes.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + NONCE_LEN + AUTH_TAG_LEN + 4;

/// Largest ciphertext a frame may declare. Anything above is treated as noise.
pub const MAX_CIPHERTEXT_LEN: usize = 64 * 1024;

/// A parsed, CRC-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedFrame {
    pub tag: KeyVerificationTag,
    /// Ciphertext bytes, excluding the authentication tag.
    pub ciphertext: Vec<u8>,
    pub auth_tag: [u8; AUTH_TAG_LEN],
    pub nonce: [u8; NONCE_LEN],
}

impl EncryptedFrame {
    /// Ciphertext followed by the authentication tag, as the AEAD expects.
    pub fn sealed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ciphertext.len() + AUTH_TAG_LEN);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.auth_tag);
        out
    }

    /// The value of the length field.
    pub fn length(&self) -> u32 {
        self.ciphertext.len() as u32
    }
}

/// Associated data binding the tag and length field to the ciphertext.
pub fn associated_data(tag: &KeyVerificationTag, ciphertext_len: u32) -> [u8; HEADER_LEN] {
    let mut aad = [0u8; HEADER_LEN];
    aad[..TAG_LEN].copy_from_slice(&tag.0);
    aad[TAG_LEN..].copy_from_slice(&ciphertext_len.to_be_bytes());
    aad
}

/// Total frame length for a ciphertext of `ciphertext_len` bytes.
pub fn frame_len(ciphertext_len: usize) -> usize {
    FRAME_OVERHEAD + ciphertext_len
}

/// Build a frame from AEAD output (`sealed` = ciphertext ‖ auth tag).
pub fn build_frame(tag: &KeyVerificationTag, nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Vec<u8> {
    debug_assert!(sealed.len() >= AUTH_TAG_LEN, "sealed output shorter than auth tag");
    let ct_len = sealed.len().saturating_sub(AUTH_TAG_LEN);

    let mut frame = Vec::with_capacity(frame_len(ct_len));
    frame.extend_from_slice(&associated_data(tag, ct_len as u32));
    frame.extend_from_slice(nonce);
    frame.extend_from_slice(sealed);

    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame
}

/// Read the declared ciphertext length from a frame header.
///
/// Returns `NoWatermarkFound` for a truncated header or a length above
/// [`MAX_CIPHERTEXT_LEN`].
pub fn peek_length(data: &[u8]) -> Result<usize, FailureReason> {
    if data.len() < HEADER_LEN {
        return Err(FailureReason::NoWatermarkFound);
    }
    let len = u32::from_be_bytes([data[TAG_LEN], data[TAG_LEN + 1], data[TAG_LEN + 2], data[TAG_LEN + 3]]) as usize;
    if len > MAX_CIPHERTEXT_LEN {
        return Err(FailureReason::NoWatermarkFound);
    }
    Ok(len)
}

/// Parse a frame, verifying the CRC.
///
/// `data` may extend past the frame (unused capacity); the real length comes
/// from the header.
///
/// # Errors
/// - `NoWatermarkFound` for an implausible header or a CRC mismatch.
/// - `DecodeFailure` when the declared length runs past the available data.
pub fn parse_frame(data: &[u8]) -> Result<EncryptedFrame, FailureReason> {
    let ct_len = peek_length(data)?;
    let total = frame_len(ct_len);
    if data.len() < total {
        return Err(FailureReason::DecodeFailure);
    }

    let body = &data[..total - 4];
    let stored_crc = u32::from_be_bytes([data[total - 4], data[total - 3], data[total - 2], data[total - 1]]);
    if crc32fast::hash(body) != stored_crc {
        return Err(FailureReason::NoWatermarkFound);
    }

    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&body[..TAG_LEN]);

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&body[HEADER_LEN..HEADER_LEN + NONCE_LEN]);

    let ct_start = HEADER_LEN + NONCE_LEN;
    let ciphertext = body[ct_start..ct_start + ct_len].to_vec();

    let mut auth_tag = [0u8; AUTH_TAG_LEN];
    auth_tag.copy_from_slice(&body[ct_start + ct_len..]);

    Ok(EncryptedFrame { tag: KeyVerificationTag(tag), ciphertext, auth_tag, nonce })
}

/// Convert bytes to a bit vector (MSB first within each byte).
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit_pos in (0..8).rev() {
            bits.push((byte >> bit_pos) & 1);
        }
    }
    bits
}

/// Convert a bit vector (MSB first) back to bytes. A trailing partial byte is
/// zero-padded.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit & 1) << (7 - i)))
        })
        .collect()
}
