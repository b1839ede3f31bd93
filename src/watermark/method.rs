// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! The closed set of embedding methods and their dispatch.
//!
//! Pixel-domain methods write a carrier bitstream into the raster through
//! [`embed_bits`] / [`extract_bits`]. The metadata-tag method carries the raw
//! frame in the container instead and has no pixel carrier.

use core::fmt;

use crate::raster::RasterImage;
use crate::watermark::crypto::DerivedSeed;
use crate::watermark::error::WatermarkError;
use crate::watermark::strength::Strength;
use crate::watermark::{bitplane, frequency};

/// An embedding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// One bit per selected pixel in the LSB of a fixed channel.
    BitPlane,
    /// Every bit repeated over several distinct samples and majority-voted.
    RedundantBitPlane,
    /// QIM on one mid-frequency DCT coefficient per selected 8×8 luma block.
    FrequencyDomain,
    /// Frame stored in a PNG text chunk.
    MetadataTag,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::BitPlane,
        Method::RedundantBitPlane,
        Method::FrequencyDomain,
        Method::MetadataTag,
    ];

    /// Auto-extraction order, most robust first.
    pub const AUTO_ORDER: [Method; 4] = [
        Method::FrequencyDomain,
        Method::RedundantBitPlane,
        Method::BitPlane,
        Method::MetadataTag,
    ];

    /// Byte stored in the payload.
    pub fn tag(self) -> u8 {
        match self {
            Self::BitPlane => 1,
            Self::RedundantBitPlane => 2,
            Self::FrequencyDomain => 3,
            Self::MetadataTag => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BitPlane => "bit-plane",
            Self::RedundantBitPlane => "redundant-bit-plane",
            Self::FrequencyDomain => "frequency-domain",
            Self::MetadataTag => "metadata-tag",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Copies per frame bit in the carrier bitstream.
    pub fn redundancy(self, strength: Strength) -> usize {
        match self {
            Self::RedundantBitPlane => strength.bit_redundancy(),
            Self::BitPlane | Self::FrequencyDomain | Self::MetadataTag => 1,
        }
    }

    pub fn is_pixel_domain(self) -> bool {
        !matches!(self, Self::MetadataTag)
    }

    /// Traversal domain separator, so each method walks its own order.
    pub(crate) fn traversal_domain(self) -> &'static [u8] {
        match self {
            Self::BitPlane => b"sealmark-units-bitplane",
            Self::RedundantBitPlane => b"sealmark-units-redundant",
            Self::FrequencyDomain => b"sealmark-units-frequency",
            Self::MetadataTag => b"sealmark-units-metadata",
        }
    }

    /// Addressable units in `image`: pixels, color samples or whole 8×8 blocks.
    pub fn unit_count(self, image: &RasterImage) -> usize {
        match self {
            Self::BitPlane => bitplane::plane_units(image),
            Self::RedundantBitPlane => bitplane::sample_units(image),
            Self::FrequencyDomain => frequency::block_units(image),
            Self::MetadataTag => 0,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An explicit method or automatic detection on extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodSelector {
    Explicit(Method),
    #[default]
    Auto,
}

impl From<Method> for MethodSelector {
    fn from(m: Method) -> Self {
        Self::Explicit(m)
    }
}

/// Write `bits` into `image` with a pixel-domain method.
///
/// The metadata-tag method leaves the pixels untouched.
///
/// # Errors
/// - [`WatermarkError::ImageTooSmall`] if the image has no units for `method`.
/// - [`WatermarkError::MessageTooLarge`] if `bits` exceeds the selected units.
pub fn embed_bits(
    method: Method,
    image: &mut RasterImage,
    bits: &[u8],
    seed: &DerivedSeed,
    strength: Strength,
) -> Result<(), WatermarkError> {
    match method {
        Method::BitPlane => bitplane::embed_bit_plane(image, bits, seed, strength),
        Method::RedundantBitPlane => bitplane::embed_redundant(image, bits, seed, strength),
        Method::FrequencyDomain => frequency::embed(image, bits, seed, strength),
        Method::MetadataTag => Ok(()),
    }
}

/// Read the carrier bitstream `method` would have written, over every
/// selected unit. Empty for the metadata-tag method.
pub fn extract_bits(method: Method, image: &RasterImage, seed: &DerivedSeed, strength: Strength) -> Vec<u8> {
    match method {
        Method::BitPlane => bitplane::extract_bit_plane(image, seed, strength),
        Method::RedundantBitPlane => bitplane::extract_redundant(image, seed, strength),
        Method::FrequencyDomain => frequency::extract(image, seed, strength),
        Method::MetadataTag => Vec::new(),
    }
}
