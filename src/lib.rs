// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! # sealmark-core
//!
//! Keyed, encrypted ownership watermarks for raster images. The owner text,
//! a timestamp and the embedding parameters are encrypted with
//! AES-256-GCM-SIV under an Argon2id-derived key, framed with a length, a
//! 16-bit key verification tag and a CRC, and written into pixels chosen by a
//! keyed permutation. Only the holder of the secret can find and read it.
//!
//! Four methods are available (see [`Method`]); extraction can try them all
//! ([`MethodSelector::Auto`]) and separates "nothing found" from "found, but
//! written with another key".
//!
//! Any format the `image` crate decodes is accepted; output is lossless PNG.
//! The engine holds no global state and performs no I/O.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use sealmark_core::{embed, extract, Method, MethodSelector};
//!
//! let cover = std::fs::read("photo.png").unwrap();
//! let out = embed(&cover, "my secret", Method::RedundantBitPlane, 50, "© A").unwrap();
//! let report = extract(&out.image, "my secret", MethodSelector::Auto, 50).unwrap();
//! assert_eq!(report.owner_text(), Some("© A"));
//! ```

pub mod analysis;
pub mod raster;
pub mod watermark;

pub use analysis::{ChannelStats, ImageAnalysis};
pub use raster::RasterImage;
pub use watermark::{embed, extract, generate_secret, validate_dimensions};
pub use watermark::{CapacityInfo, KeyVerificationTag, Strength, WatermarkPayload};
pub use watermark::{DEFAULT_STRENGTH, MAX_DIMENSION, MAX_INPUT_BYTES, MAX_PIXELS, MIN_DIMENSION};
pub use watermark::{EmbedOutput, EmbedRequest, EngineConfig, ExtractReport, ExtractRequest, WatermarkEngine};
pub use watermark::{FailureReason, Method, MethodSelector, Stage, StageError, WatermarkError};
