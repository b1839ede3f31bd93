// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the watermark pipeline.
//!
//! [`WatermarkError`] covers every failure from image decoding through
//! decryption. [`FailureReason`] is the recoverable subset reported inside
//! extraction results, and [`StageError`] tags an aborted call with the
//! last pipeline stage it reached.

use core::fmt;

/// Errors that can occur while embedding or extracting a watermark.
#[derive(Debug)]
pub enum WatermarkError {
    /// The secret key is empty or cannot be fed to the key derivation.
    InvalidKey,
    /// Strength outside `1..=100`.
    InvalidStrength(u8),
    /// The input bytes are not a raster format we can decode.
    UnsupportedImageFormat,
    /// Input exceeds the configured byte, dimension or pixel limits.
    ImageTooLarge,
    /// The image has no addressable units for the requested method.
    ImageTooSmall,
    /// The payload does not fit the image's capacity at this strength.
    MessageTooLarge,
    /// Bitstream framing is invalid for any key.
    NoWatermarkFound,
    /// Frame is intact but carries another key's verification tag.
    KeyMismatch,
    /// AEAD authentication failed (wrong key or no watermark).
    AuthenticationFailed,
    /// Internal inconsistency in the recovered frame or plaintext.
    DecodeFailure,
    /// The image decoder rejected the input.
    Image(image::ImageError),
    /// Writing the output container failed.
    Encode(image::ImageError),
    /// An engine setting is unusable.
    InvalidConfig(&'static str),
}

impl fmt::Display for WatermarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "secret key must not be empty"),
            Self::InvalidStrength(s) => write!(f, "strength {s} outside 1..=100"),
            Self::UnsupportedImageFormat => write!(f, "unsupported image format"),
            Self::ImageTooLarge => write!(f, "image exceeds the size limit"),
            Self::ImageTooSmall => write!(f, "image too small for embedding"),
            Self::MessageTooLarge => write!(f, "payload exceeds image capacity at this strength"),
            Self::NoWatermarkFound => write!(f, "no watermark found"),
            Self::KeyMismatch => write!(f, "watermark present but key does not match"),
            Self::AuthenticationFailed => write!(f, "authentication failed (wrong key or no watermark)"),
            Self::DecodeFailure => write!(f, "watermark frame is inconsistent"),
            Self::Image(e) => write!(f, "image decode error: {e}"),
            Self::Encode(e) => write!(f, "image encode error: {e}"),
            Self::InvalidConfig(what) => write!(f, "invalid engine configuration: {what}"),
        }
    }
}

impl std::error::Error for WatermarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(e) | Self::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FailureReason> for WatermarkError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::NoWatermarkFound => Self::NoWatermarkFound,
            FailureReason::DecodeFailure => Self::DecodeFailure,
            FailureReason::AuthenticationFailed => Self::AuthenticationFailed,
            FailureReason::KeyMismatch => Self::KeyMismatch,
        }
    }
}

/// Recoverable extraction outcome that is not a success.
///
/// Variants are declared in increasing order of how actionable they are for
/// the caller, so `Ord` picks the most informative of several failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailureReason {
    NoWatermarkFound,
    DecodeFailure,
    AuthenticationFailed,
    KeyMismatch,
}

impl FailureReason {
    /// Whether a watermark frame was structurally recognized.
    pub fn frame_present(self) -> bool {
        matches!(self, Self::KeyMismatch)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        WatermarkError::from(*self).fmt(f)
    }
}

/// Per-call pipeline state. A failed call records the last state it reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    Idle,
    KeyDerived,
    PayloadEncoded,
    UnitsSelected,
    Written,
    Read,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::KeyDerived => "key-derived",
            Self::PayloadEncoded => "payload-encoded",
            Self::UnitsSelected => "units-selected",
            Self::Written => "written",
            Self::Read => "read",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// An aborted engine call: the error and the stage it was in.
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: WatermarkError,
}

impl StageError {
    pub fn new(stage: Stage, error: WatermarkError) -> Self {
        Self { stage, error }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after stage {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
