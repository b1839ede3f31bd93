// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Metadata-tag carrier: the raw frame in a PNG `tEXt` chunk.
//!
//! Chunk data is `keyword NUL hex(frame)`, inserted directly before `IEND`.
//! The tag is trivially strippable and exists to pair with a pixel-domain
//! method or to carry the frame through pipelines that keep ancillary
//! chunks. Non-PNG containers never carry a tag.

use crate::watermark::error::FailureReason;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const TEXT_CHUNK: &[u8; 4] = b"tEXt";
const IEND_CHUNK: &[u8; 4] = b"IEND";

/// Longest keyword PNG allows.
const MAX_KEYWORD_LEN: usize = 79;

/// One chunk of a PNG stream, borrowed.
struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
    /// Offset of the chunk's length field.
    start: usize,
}

/// Walk the chunks of `png`. Stops at the first truncated chunk.
fn chunks(png: &[u8]) -> Option<impl Iterator<Item = Chunk<'_>>> {
    if png.len() < PNG_SIGNATURE.len() || png[..8] != PNG_SIGNATURE {
        return None;
    }
    let mut offset = PNG_SIGNATURE.len();
    Some(std::iter::from_fn(move || {
        let header = png.get(offset..offset + 8)?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = [header[4], header[5], header[6], header[7]];
        let data_start = offset + 8;
        let data = png.get(data_start..data_start.checked_add(len)?)?;
        let start = offset;
        // 4-byte CRC after the data
        offset = data_start + len + 4;
        if offset > png.len() {
            return None;
        }
        Some(Chunk { kind, data, start })
    }))
}

/// Serialize one chunk with its CRC.
fn create_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(12 + data.len());
    chunk.extend_from_slice(&(data.len() as u32).to_be_bytes());
    chunk.extend_from_slice(kind);
    chunk.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    chunk.extend_from_slice(&hasher.finalize().to_be_bytes());
    chunk
}

fn keyword_valid(keyword: &str) -> bool {
    !keyword.is_empty() && keyword.len() <= MAX_KEYWORD_LEN && keyword.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Insert a tag carrying `frame` before `IEND`.
///
/// Returns `None` if `png` is not a well-formed PNG stream with an `IEND`
/// chunk, or the keyword is not a valid PNG keyword.
pub fn insert_tag(png: &[u8], keyword: &str, frame: &[u8]) -> Option<Vec<u8>> {
    if !keyword_valid(keyword) {
        return None;
    }
    let iend = chunks(png)?.find(|c| &c.kind == IEND_CHUNK)?;

    let mut data = Vec::with_capacity(keyword.len() + 1 + frame.len() * 2);
    data.extend_from_slice(keyword.as_bytes());
    data.push(0);
    data.extend_from_slice(hex::encode(frame).as_bytes());
    let chunk = create_chunk(TEXT_CHUNK, &data);

    let mut out = Vec::with_capacity(png.len() + chunk.len());
    out.extend_from_slice(&png[..iend.start]);
    out.extend_from_slice(&chunk);
    out.extend_from_slice(&png[iend.start..]);
    Some(out)
}

/// Find the frame stored under `keyword`.
///
/// # Errors
/// - `NoWatermarkFound` if the container is not PNG or carries no such tag.
/// - `DecodeFailure` if the tag exists but its text is not valid hex.
pub fn read_tag(container: &[u8], keyword: &str) -> Result<Vec<u8>, FailureReason> {
    let text = chunks(container)
        .ok_or(FailureReason::NoWatermarkFound)?
        .filter(|c| &c.kind == TEXT_CHUNK)
        .find_map(|c| tag_text(c.data, keyword))
        .ok_or(FailureReason::NoWatermarkFound)?;
    hex::decode(text).map_err(|_| FailureReason::DecodeFailure)
}

/// Whether `container` carries a tag under `keyword`.
pub fn has_tag(container: &[u8], keyword: &str) -> bool {
    chunks(container).is_some_and(|mut it| it.any(|c| &c.kind == TEXT_CHUNK && tag_text(c.data, keyword).is_some()))
}

/// Remove every tag under `keyword`. Non-PNG input is returned unchanged.
pub fn strip_tag(container: &[u8], keyword: &str) -> Vec<u8> {
    let Some(iter) = chunks(container) else {
        return container.to_vec();
    };
    let mut out = container[..PNG_SIGNATURE.len()].to_vec();
    let mut end = PNG_SIGNATURE.len();
    for c in iter {
        let chunk_end = c.start + 12 + c.data.len();
        if !(&c.kind == TEXT_CHUNK && tag_text(c.data, keyword).is_some()) {
            out.extend_from_slice(&container[c.start..chunk_end]);
        }
        end = chunk_end;
    }
    out.extend_from_slice(&container[end..]);
    out
}

/// The text after `keyword NUL`, if this chunk belongs to `keyword`.
fn tag_text<'a>(data: &'a [u8], keyword: &str) -> Option<&'a [u8]> {
    let rest = data.strip_prefix(keyword.as_bytes())?;
    rest.strip_prefix(&[0u8])
}
