// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Capacity estimation.
//!
//! The owner-text limit is computed for uncompressed text, so it is a lower
//! bound: compressible text may fit beyond it.

use crate::raster::RasterImage;
use crate::watermark::frame::{FRAME_OVERHEAD, MAX_CIPHERTEXT_LEN};
use crate::watermark::method::Method;
use crate::watermark::payload::{MAX_OWNER_TEXT_BYTES, PAYLOAD_OVERHEAD};
use crate::watermark::permute::selected_count;
use crate::watermark::strength::Strength;

/// Capacity of one image for one method and strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapacityInfo {
    pub method: Method,
    /// Addressable units (pixels, samples or blocks).
    pub units: usize,
    /// Units the traversal selects at this strength.
    pub selected_units: usize,
    /// Copies per frame bit.
    pub redundancy: usize,
    /// Whole frame bytes the selected units can carry.
    pub frame_bytes: usize,
    /// Longest uncompressed owner text that fits, in bytes.
    pub max_owner_text_bytes: usize,
}

impl CapacityInfo {
    /// Whether a carrier bitstream of `bits` bits fits.
    pub fn fits_bits(&self, bits: usize) -> bool {
        match self.method {
            Method::MetadataTag => true,
            _ => bits <= self.selected_units,
        }
    }
}

/// Compute the capacity of `image` for `method` at `strength`.
pub fn capacity(image: &RasterImage, method: Method, strength: Strength) -> CapacityInfo {
    let redundancy = method.redundancy(strength);
    let units = method.unit_count(image);

    let (selected_units, frame_bytes) = match method {
        Method::MetadataTag => (0, FRAME_OVERHEAD + MAX_CIPHERTEXT_LEN),
        _ => {
            let selected = selected_count(units, strength);
            (selected, selected / redundancy / 8)
        }
    };
    let max_owner_text_bytes = frame_bytes
        .saturating_sub(FRAME_OVERHEAD + PAYLOAD_OVERHEAD)
        .min(MAX_OWNER_TEXT_BYTES);

    CapacityInfo { method, units, selected_units, redundancy, frame_bytes, max_owner_text_bytes }
}
