// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Watermark embedding and extraction pipelines.
//!
//! Four methods share one key-derivation and payload pipeline:
//!
//! - **BitPlane**: LSB of the blue channel of keyed-selected pixels.
//!   Highest capacity, lost on any lossy re-encode.
//! - **RedundantBitPlane**: every frame bit on 3–9 distinct color samples,
//!   majority-voted. Survives sparse pixel edits.
//! - **FrequencyDomain**: QIM on a mid-frequency DCT coefficient of keyed
//!   8×8 luma blocks. Survives moderate JPEG recompression.
//! - **MetadataTag**: frame in a PNG text chunk. Strippable; pairs with a
//!   pixel method.
//!
//! Frames are AES-256-GCM-SIV encrypted under an Argon2id-derived key and
//! carry a 16-bit key verification tag. [`WatermarkEngine`] orchestrates a
//! call; [`embed`] and [`extract`] wrap a default engine.

pub mod bitplane;
pub mod capacity;
pub mod codec;
pub mod crypto;
pub mod dct;
pub mod engine;
pub mod error;
pub mod frame;
pub mod frequency;
pub mod metadata;
pub mod method;
pub mod payload;
pub mod permute;
pub mod repetition;
pub mod strength;

use rand::RngCore;

pub use capacity::CapacityInfo;
pub use crypto::KeyVerificationTag;
pub use engine::{EmbedOutput, EmbedRequest, EngineConfig, ExtractReport, ExtractRequest, WatermarkEngine};
pub use error::{FailureReason, Stage, StageError, WatermarkError};
pub use method::{Method, MethodSelector};
pub use payload::WatermarkPayload;
pub use strength::Strength;

/// Strength used when the caller does not pick one.
pub const DEFAULT_STRENGTH: u8 = 50;

/// Maximum pixel dimension (width or height) accepted on input.
pub const MAX_DIMENSION: u32 = 8192;

/// Maximum total pixel count (width × height) accepted on input.
pub const MAX_PIXELS: u64 = 16_000_000;

/// Minimum pixel dimension for embedding: one whole 8×8 block.
pub const MIN_DIMENSION: u32 = 8;

/// Maximum encoded input size.
pub const MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Validate image dimensions for embedding.
///
/// # Errors
/// - [`WatermarkError::ImageTooSmall`] if either dimension is below
///   [`MIN_DIMENSION`].
/// - [`WatermarkError::ImageTooLarge`] if either dimension exceeds the
///   configured maximum or the pixel count does.
pub fn validate_dimensions(width: u32, height: u32, config: &EngineConfig) -> Result<(), WatermarkError> {
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(WatermarkError::ImageTooSmall);
    }
    if width > config.max_dimension
        || height > config.max_dimension
        || width as u64 * height as u64 > config.max_pixels
    {
        return Err(WatermarkError::ImageTooLarge);
    }
    Ok(())
}

/// Fresh random secret: 32 bytes from the OS-seeded thread RNG, hex-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Embed with a default engine.
///
/// # Errors
/// See [`WatermarkEngine::embed`].
pub fn embed(
    image: &[u8],
    secret: &str,
    method: Method,
    strength: u8,
    owner_text: &str,
) -> Result<EmbedOutput, StageError> {
    WatermarkEngine::default().embed(&EmbedRequest::new(image, secret, method, owner_text).strength(strength))
}

/// Extract with a default engine.
///
/// # Errors
/// See [`WatermarkEngine::extract`].
pub fn extract(
    image: &[u8],
    secret: &str,
    method: impl Into<MethodSelector>,
    strength: u8,
) -> Result<ExtractReport, StageError> {
    WatermarkEngine::default().extract(&ExtractRequest::new(image, secret).method(method).strength(strength))
}

#[cfg(test)]
mod dimension_tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn valid_dimensions() {
        assert!(validate_dimensions(800, 600, &config()).is_ok());
        assert!(validate_dimensions(8, 8, &config()).is_ok());
    }

    #[test]
    fn boundary_max_dimension() {
        assert!(validate_dimensions(8192, 1000, &config()).is_ok());
        assert!(validate_dimensions(8193, 1000, &config()).is_err());
        assert!(validate_dimensions(1000, 8193, &config()).is_err());
    }

    #[test]
    fn too_many_pixels() {
        // 5000 * 3201 = 16_005_000 > 16M
        assert!(matches!(validate_dimensions(5000, 3201, &config()), Err(WatermarkError::ImageTooLarge)));
        assert!(validate_dimensions(4000, 4000, &config()).is_ok());
    }

    #[test]
    fn too_small() {
        assert!(matches!(validate_dimensions(7, 100, &config()), Err(WatermarkError::ImageTooSmall)));
        assert!(matches!(validate_dimensions(100, 0, &config()), Err(WatermarkError::ImageTooSmall)));
    }

    #[test]
    fn generated_secrets_are_hex_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
