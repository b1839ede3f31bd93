// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Watermark engine: request validation, method dispatch and Auto detection.
//!
//! Every call works on its own decoded copy of the input and holds key
//! material only for the duration of the call. Embedding either returns the
//! complete output or an error; there is no partial output.
//!
//! ## Extraction outcomes
//!
//! A request that cannot be evaluated at all (bad strength, empty key,
//! undecodable or oversized image) is an `Err`. Everything else, including
//! "nothing found" and "wrong key", is an [`ExtractReport`]:
//!
//! | outcome                | present | key_valid |
//! |------------------------|---------|-----------|
//! | decoded                | true    | true      |
//! | `KeyMismatch`          | true    | false     |
//! | `AuthenticationFailed` | false   | false     |
//! | `NoWatermarkFound`     | false   | false     |
//! | `DecodeFailure`        | false   | false     |
//!
//! Pixel-domain traversals depend on the key, so a wrong key usually reads
//! noise and reports `NoWatermarkFound`. `KeyMismatch` needs a frame that is
//! reachable without the key, i.e. a metadata tag.

use core::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::analysis::{self, ImageAnalysis};
use crate::raster::{DecodeLimits, RasterImage};
use crate::watermark::capacity::{self, CapacityInfo};
use crate::watermark::codec::{self, Decoded};
use crate::watermark::crypto::{self, KeyMaterial, KeyVerificationTag};
use crate::watermark::error::{FailureReason, Stage, StageError, WatermarkError};
use crate::watermark::method::{self, Method, MethodSelector};
use crate::watermark::metadata;
use crate::watermark::payload::WatermarkPayload;
use crate::watermark::strength::Strength;
use crate::watermark::{MAX_DIMENSION, MAX_INPUT_BYTES, MAX_PIXELS};

/// Default `tEXt` keyword for the metadata-tag method.
pub const DEFAULT_METADATA_KEYWORD: &str = "sealmark";

/// Engine limits and behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Largest accepted width or height.
    pub max_dimension: u32,
    /// Largest accepted `width × height`.
    pub max_pixels: u64,
    /// Largest accepted input container size.
    pub max_input_bytes: usize,
    /// PNG `tEXt` keyword used by the metadata-tag method.
    pub metadata_keyword: String,
    /// Methods tried by [`MethodSelector::Auto`], in order.
    pub auto_order: Vec<Method>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
            max_input_bytes: MAX_INPUT_BYTES,
            metadata_keyword: DEFAULT_METADATA_KEYWORD.to_string(),
            auto_order: Method::AUTO_ORDER.to_vec(),
        }
    }
}

/// Inputs of one embed call.
#[derive(Clone, Copy)]
pub struct EmbedRequest<'a> {
    /// Encoded cover image (any supported container).
    pub image: &'a [u8],
    pub secret: &'a str,
    pub method: Method,
    pub strength: u8,
    pub owner_text: &'a str,
    /// Also store the frame as a metadata tag next to a pixel-domain method.
    pub with_metadata_tag: bool,
}

impl<'a> EmbedRequest<'a> {
    pub fn new(image: &'a [u8], secret: &'a str, method: Method, owner_text: &'a str) -> Self {
        Self {
            image,
            secret,
            method,
            strength: crate::watermark::DEFAULT_STRENGTH,
            owner_text,
            with_metadata_tag: false,
        }
    }

    pub fn strength(mut self, strength: u8) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_metadata_tag(mut self, enabled: bool) -> Self {
        self.with_metadata_tag = enabled;
        self
    }
}

impl fmt::Debug for EmbedRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedRequest")
            .field("image_len", &self.image.len())
            .field("method", &self.method)
            .field("strength", &self.strength)
            .field("with_metadata_tag", &self.with_metadata_tag)
            .finish_non_exhaustive()
    }
}

/// Result of a successful embed.
#[derive(Debug, Clone)]
pub struct EmbedOutput {
    /// Watermarked image, PNG-encoded.
    pub image: Vec<u8>,
    /// Verification tag of the key used; safe to show or store.
    pub verification_hint: KeyVerificationTag,
    pub method: Method,
    pub strength: Strength,
    /// Carrier bits written (0 for the metadata-tag method).
    pub carrier_bits: usize,
    /// Whether a metadata tag was written.
    pub metadata_tag: bool,
    pub payload: WatermarkPayload,
}

/// Inputs of one extract call.
#[derive(Clone, Copy)]
pub struct ExtractRequest<'a> {
    pub image: &'a [u8],
    pub secret: &'a str,
    pub method: MethodSelector,
    /// Must equal the strength used at embed time.
    pub strength: u8,
}

impl<'a> ExtractRequest<'a> {
    pub fn new(image: &'a [u8], secret: &'a str) -> Self {
        Self { image, secret, method: MethodSelector::Auto, strength: crate::watermark::DEFAULT_STRENGTH }
    }

    pub fn method(mut self, method: impl Into<MethodSelector>) -> Self {
        self.method = method.into();
        self
    }

    pub fn strength(mut self, strength: u8) -> Self {
        self.strength = strength;
        self
    }
}

impl fmt::Debug for ExtractRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractRequest")
            .field("image_len", &self.image.len())
            .field("method", &self.method)
            .field("strength", &self.strength)
            .finish_non_exhaustive()
    }
}

/// Structured extraction outcome.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractReport {
    /// A watermark frame was recognized.
    pub present: bool,
    /// The frame was written with the caller's key and decrypted.
    pub key_valid: bool,
    pub payload: Option<WatermarkPayload>,
    /// Method that produced the outcome, when one was recognized.
    pub method_used: Option<Method>,
    pub failure: Option<FailureReason>,
    /// Share of repeated copies agreeing with the vote, in percent.
    pub integrity_percent: Option<u8>,
}

impl ExtractReport {
    fn success(method: Method, decoded: Decoded) -> Self {
        Self {
            present: true,
            key_valid: true,
            payload: Some(decoded.payload),
            method_used: Some(method),
            failure: None,
            integrity_percent: Some(decoded.integrity_percent),
        }
    }

    fn failure(method: Method, reason: FailureReason) -> Self {
        Self {
            present: reason.frame_present(),
            key_valid: false,
            payload: None,
            method_used: reason.frame_present().then_some(method),
            failure: Some(reason),
            integrity_percent: None,
        }
    }

    pub fn owner_text(&self) -> Option<&str> {
        self.payload.as_ref().map(|p| p.owner_text.as_str())
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.payload.as_ref().map(|p| p.created_at)
    }
}

/// Tracks the per-call state machine so failures name their stage.
struct StageTracker {
    stage: Stage,
}

impl StageTracker {
    fn new() -> Self {
        Self { stage: Stage::Idle }
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage");
        self.stage = stage;
    }

    fn fail(&self, error: WatermarkError) -> StageError {
        tracing::debug!(stage = %self.stage, %error, "call aborted");
        StageError::new(self.stage, error)
    }
}

/// Stateless watermark engine. Cheap to clone; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct WatermarkEngine {
    config: EngineConfig,
}

impl WatermarkEngine {
    /// Create an engine, validating `config`.
    ///
    /// # Errors
    /// [`WatermarkError::InvalidConfig`] for zero limits, an unusable
    /// metadata keyword or an empty Auto order.
    pub fn new(config: EngineConfig) -> Result<Self, WatermarkError> {
        if config.max_dimension == 0 || config.max_pixels == 0 || config.max_input_bytes == 0 {
            return Err(WatermarkError::InvalidConfig("size limits must be positive"));
        }
        let keyword = &config.metadata_keyword;
        if keyword.is_empty() || keyword.len() > 79 || !keyword.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
            return Err(WatermarkError::InvalidConfig("metadata keyword must be 1-79 printable ASCII bytes"));
        }
        if config.auto_order.is_empty() {
            return Err(WatermarkError::InvalidConfig("auto order must name at least one method"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_input_bytes: self.config.max_input_bytes,
            max_dimension: self.config.max_dimension,
            max_pixels: self.config.max_pixels,
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, WatermarkError> {
        RasterImage::decode(bytes, &self.limits())
    }

    /// Embed an encrypted ownership watermark.
    ///
    /// # Errors
    /// A [`StageError`] naming the last stage reached. Causes include
    /// [`WatermarkError::InvalidStrength`], [`WatermarkError::InvalidKey`],
    /// image format and size errors, and [`WatermarkError::MessageTooLarge`]
    /// when the payload exceeds the image's capacity.
    #[tracing::instrument(skip_all, fields(method = %req.method, strength = req.strength))]
    pub fn embed(&self, req: &EmbedRequest<'_>) -> Result<EmbedOutput, StageError> {
        let mut tracker = StageTracker::new();

        let strength = Strength::new(req.strength).map_err(|e| tracker.fail(e))?;
        let raster = self.decode(req.image).map_err(|e| tracker.fail(e))?;
        crate::watermark::validate_dimensions(raster.width(), raster.height(), &self.config)
            .map_err(|e| tracker.fail(e))?;

        let keys = crypto::derive_key_material(req.secret).map_err(|e| tracker.fail(e))?;
        tracker.advance(Stage::KeyDerived);

        let payload = WatermarkPayload::new(req.owner_text, req.method, strength.get(), raster.width(), raster.height());
        let frame = codec::encode_frame(&payload, &keys).map_err(|e| tracker.fail(e))?;
        let redundancy = req.method.redundancy(strength);
        let bits = if req.method.is_pixel_domain() {
            codec::frame_to_bits(&frame, redundancy)
        } else {
            Vec::new()
        };
        tracker.advance(Stage::PayloadEncoded);

        let cap = capacity::capacity(&raster, req.method, strength);
        if req.method.is_pixel_domain() && cap.units == 0 {
            return Err(tracker.fail(WatermarkError::ImageTooSmall));
        }
        if !cap.fits_bits(bits.len()) {
            tracing::debug!(needed = bits.len(), available = cap.selected_units, "payload exceeds capacity");
            return Err(tracker.fail(WatermarkError::MessageTooLarge));
        }
        tracing::debug!(units = cap.units, selected = cap.selected_units, redundancy, "units selected");
        tracker.advance(Stage::UnitsSelected);

        let mut working = raster;
        method::embed_bits(req.method, &mut working, &bits, &keys.seed, strength).map_err(|e| tracker.fail(e))?;
        let mut image = working.encode_png().map_err(|e| tracker.fail(e))?;

        let metadata_tag = req.method == Method::MetadataTag || req.with_metadata_tag;
        if metadata_tag {
            image = metadata::insert_tag(&image, &self.config.metadata_keyword, &frame)
                .ok_or_else(|| tracker.fail(WatermarkError::InvalidConfig("metadata keyword rejected")))?;
        }
        tracker.advance(Stage::Written);
        tracker.advance(Stage::Done);

        tracing::info!(
            method = %req.method,
            strength = strength.get(),
            carrier_bits = bits.len(),
            metadata_tag,
            hint = %keys.tag,
            "watermark embedded"
        );

        Ok(EmbedOutput {
            image,
            verification_hint: keys.tag,
            method: req.method,
            strength,
            carrier_bits: bits.len(),
            metadata_tag,
            payload,
        })
    }

    /// Look for a watermark written with `req.secret`.
    ///
    /// # Errors
    /// A [`StageError`] only when the request itself is unusable: invalid
    /// strength, empty key, or an image that cannot be decoded within the
    /// configured limits. Negative outcomes are reported in the
    /// [`ExtractReport`].
    #[tracing::instrument(skip_all, fields(strength = req.strength))]
    pub fn extract(&self, req: &ExtractRequest<'_>) -> Result<ExtractReport, StageError> {
        let mut tracker = StageTracker::new();

        let strength = Strength::new(req.strength).map_err(|e| tracker.fail(e))?;
        let raster = self.decode(req.image).map_err(|e| tracker.fail(e))?;
        let keys = crypto::derive_key_material(req.secret).map_err(|e| tracker.fail(e))?;
        tracker.advance(Stage::KeyDerived);
        tracker.advance(Stage::UnitsSelected);

        let order: &[Method] = match req.method {
            MethodSelector::Explicit(ref m) => std::slice::from_ref(m),
            MethodSelector::Auto => &self.config.auto_order,
        };
        let attempt = |&m: &Method| (m, self.attempt(m, &raster, req.image, &keys, strength));

        #[cfg(feature = "parallel")]
        let outcomes: Vec<(Method, Result<Decoded, FailureReason>)> = order.par_iter().map(attempt).collect();
        #[cfg(not(feature = "parallel"))]
        let outcomes = sequential_attempts(order, attempt);

        tracker.advance(Stage::Read);
        let report = select_outcome(outcomes);
        tracker.advance(Stage::Done);

        match &report.failure {
            None => tracing::info!(method = ?report.method_used, "watermark extracted"),
            Some(reason) => tracing::info!(%reason, present = report.present, "no watermark for this key"),
        }
        Ok(report)
    }

    /// Try one method.
    fn attempt(
        &self,
        method: Method,
        raster: &RasterImage,
        container: &[u8],
        keys: &KeyMaterial,
        strength: Strength,
    ) -> Result<Decoded, FailureReason> {
        let outcome = if method.is_pixel_domain() {
            let bits = method::extract_bits(method, raster, &keys.seed, strength);
            codec::decode(&bits, keys, method.redundancy(strength))
        } else {
            let frame = metadata::read_tag(container, &self.config.metadata_keyword)?;
            codec::decode_frame(&frame, keys).map(|payload| Decoded { payload, integrity_percent: 100 })
        };
        tracing::debug!(%method, ok = outcome.is_ok(), "attempt");
        outcome
    }

    /// Capacity of an encoded image for `method` at `strength`.
    ///
    /// # Errors
    /// Strength, format and size errors as for [`Self::embed`].
    pub fn capacity(&self, image: &[u8], method: Method, strength: u8) -> Result<CapacityInfo, WatermarkError> {
        let strength = Strength::new(strength)?;
        let raster = self.decode(image)?;
        Ok(capacity::capacity(&raster, method, strength))
    }

    /// Describe an encoded image.
    ///
    /// # Errors
    /// Format and size errors as for [`Self::embed`].
    pub fn analyze(&self, image: &[u8]) -> Result<ImageAnalysis, WatermarkError> {
        let raster = self.decode(image)?;
        Ok(analysis::analyze(image, &raster, &self.config.metadata_keyword))
    }
}

/// Run attempts in order, stopping at the first success.
#[cfg(not(feature = "parallel"))]
fn sequential_attempts<F>(order: &[Method], attempt: F) -> Vec<(Method, Result<Decoded, FailureReason>)>
where
    F: Fn(&Method) -> (Method, Result<Decoded, FailureReason>),
{
    let mut outcomes = Vec::with_capacity(order.len());
    for m in order {
        let outcome = attempt(m);
        let done = outcome.1.is_ok();
        outcomes.push(outcome);
        if done {
            break;
        }
    }
    outcomes
}

/// First success in order; otherwise the most informative failure, earliest
/// method winning ties.
fn select_outcome(outcomes: Vec<(Method, Result<Decoded, FailureReason>)>) -> ExtractReport {
    let mut best: Option<(Method, FailureReason)> = None;
    for (method, outcome) in outcomes {
        match outcome {
            Ok(decoded) => return ExtractReport::success(method, decoded),
            Err(reason) => {
                if best.map_or(true, |(_, b)| reason > b) {
                    best = Some((method, reason));
                }
            }
        }
    }
    match best {
        Some((method, reason)) => ExtractReport::failure(method, reason),
        None => ExtractReport {
            present: false,
            key_valid: false,
            payload: None,
            method_used: None,
            failure: Some(FailureReason::NoWatermarkFound),
            integrity_percent: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cover(w: u32, h: u32) -> Vec<u8> {
        let mut samples = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                samples.extend_from_slice(&[(60 + (x * 3 + y) % 120) as u8, (80 + (x + y * 5) % 100) as u8, (70 + (x * y) % 110) as u8]);
            }
        }
        RasterImage::new(w, h, 3, samples).unwrap().encode_png().unwrap()
    }

    fn decoded(method: Method) -> Decoded {
        Decoded { payload: WatermarkPayload::new("x", method, 50, 1, 1), integrity_percent: 100 }
    }

    #[test]
    fn select_prefers_success() {
        let report = select_outcome(vec![
            (Method::FrequencyDomain, Err(FailureReason::KeyMismatch)),
            (Method::BitPlane, Ok(decoded(Method::BitPlane))),
        ]);
        assert!(report.present && report.key_valid);
        assert_eq!(report.method_used, Some(Method::BitPlane));
    }

    #[test]
    fn select_prefers_key_mismatch_over_not_found() {
        let report = select_outcome(vec![
            (Method::FrequencyDomain, Err(FailureReason::NoWatermarkFound)),
            (Method::RedundantBitPlane, Err(FailureReason::DecodeFailure)),
            (Method::MetadataTag, Err(FailureReason::KeyMismatch)),
            (Method::BitPlane, Err(FailureReason::NoWatermarkFound)),
        ]);
        assert_eq!(report.failure, Some(FailureReason::KeyMismatch));
        assert!(report.present);
        assert!(!report.key_valid);
        assert_eq!(report.method_used, Some(Method::MetadataTag));
    }

    #[test]
    fn not_found_names_no_method() {
        let report = select_outcome(vec![(Method::BitPlane, Err(FailureReason::NoWatermarkFound))]);
        assert!(!report.present);
        assert_eq!(report.method_used, None);
    }

    #[test]
    fn config_validation() {
        assert!(WatermarkEngine::new(EngineConfig::default()).is_ok());
        let bad = EngineConfig { metadata_keyword: String::new(), ..EngineConfig::default() };
        assert!(matches!(WatermarkEngine::new(bad), Err(WatermarkError::InvalidConfig(_))));
        let bad = EngineConfig { auto_order: Vec::new(), ..EngineConfig::default() };
        assert!(matches!(WatermarkEngine::new(bad), Err(WatermarkError::InvalidConfig(_))));
    }

    #[test]
    fn invalid_strength_fails_in_idle() {
        let engine = WatermarkEngine::default();
        let img = cover(64, 64);
        let err = engine.embed(&EmbedRequest::new(&img, "k", Method::BitPlane, "x").strength(0)).unwrap_err();
        assert_eq!(err.stage, Stage::Idle);
        assert!(matches!(err.error, WatermarkError::InvalidStrength(0)));
    }

    #[test]
    fn empty_key_fails_in_idle() {
        let engine = WatermarkEngine::default();
        let img = cover(64, 64);
        let err = engine.extract(&ExtractRequest::new(&img, "")).unwrap_err();
        assert_eq!(err.stage, Stage::Idle);
        assert!(matches!(err.error, WatermarkError::InvalidKey));
    }

    #[test]
    fn capacity_error_reports_payload_stage() {
        let engine = WatermarkEngine::default();
        let img = cover(32, 32);
        let err = engine
            .embed(&EmbedRequest::new(&img, "k", Method::FrequencyDomain, "owner"))
            .unwrap_err();
        assert_eq!(err.stage, Stage::PayloadEncoded);
        assert!(matches!(err.error, WatermarkError::MessageTooLarge));
    }

    #[test]
    fn bit_plane_roundtrip_through_engine() {
        let engine = WatermarkEngine::default();
        let img = cover(96, 96);
        let out = engine.embed(&EmbedRequest::new(&img, "k1", Method::BitPlane, "owner")).unwrap();
        assert!(!out.metadata_tag);
        let report = engine
            .extract(&ExtractRequest::new(&out.image, "k1").method(Method::BitPlane))
            .unwrap();
        assert!(report.present && report.key_valid, "{report:?}");
        assert_eq!(report.owner_text(), Some("owner"));
        assert_eq!(report.created_at(), Some(out.payload.created_at));
    }

    #[test]
    fn metadata_method_leaves_pixels_alone() {
        let engine = WatermarkEngine::default();
        let img = cover(40, 40);
        let out = engine.embed(&EmbedRequest::new(&img, "k1", Method::MetadataTag, "owner")).unwrap();
        assert_eq!(out.carrier_bits, 0);
        let before = image::load_from_memory(&img).unwrap();
        let after = image::load_from_memory(&out.image).unwrap();
        assert_eq!(before.as_bytes(), after.as_bytes());
    }
}
