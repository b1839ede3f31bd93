// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Frequency-domain carrier: QIM on one DCT coefficient per 8×8 luma block.
//!
//! Each selected block carries one bit in its (2,3) coefficient, a mid
//! frequency that survives JPEG quantization at ordinary quality settings
//! without the visibility of low-frequency changes.
//!
//! ## Quantization Index Modulation
//!
//! Two interleaved lattices with step Δ:
//!   Q₀ = { n·Δ }         (bit 0)
//!   Q₁ = { (n + ½)·Δ }   (bit 1)
//!
//! Embedding moves the coefficient to the nearest point of the bit's lattice.
//! Extraction picks whichever lattice is closer, so any disturbance below
//! Δ/4 is absorbed. Δ grows with strength.
//!
//! ## Pixel write-back
//!
//! The coefficient delta is mapped to pixels through the DCT basis function
//! and added equally to R, G and B, which shifts BT.601 luma by exactly that
//! amount. Rounding to 8 bits and clamping at 0/255 perturb the result, so up
//! to [`MAX_REFINE_PASSES`] passes re-read the rounded block and correct the
//! residual. Alpha is never touched.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::raster::RasterImage;
use crate::watermark::crypto::DerivedSeed;
use crate::watermark::dct::{self, BLOCK};
use crate::watermark::error::WatermarkError;
use crate::watermark::method::Method;
use crate::watermark::permute::{self, Traversal};
use crate::watermark::strength::Strength;

/// Carrier coefficient, row-major `(v, u)`.
const COEFF_V: usize = 2;
const COEFF_U: usize = 3;
const COEFF: usize = COEFF_V * BLOCK + COEFF_U;

const MAX_REFINE_PASSES: usize = 8;

/// BT.601 luma weights.
const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Units for [`Method::FrequencyDomain`]: whole 8×8 blocks. Partial edge
/// blocks are skipped.
pub fn block_units(image: &RasterImage) -> usize {
    blocks_wide(image) * (image.height() as usize / BLOCK)
}

fn blocks_wide(image: &RasterImage) -> usize {
    image.width() as usize / BLOCK
}

/// Quantize `p` to the nearest point in the Q_b lattice.
///
/// - Q_0: centers at {n * delta} for integer n
/// - Q_1: centers at {(n + 0.5) * delta} for integer n
fn quantize_for_bit(p: f64, delta: f64, bit: u8) -> f64 {
    if bit == 0 {
        (p / delta).round() * delta
    } else {
        ((p / delta - 0.5).round() + 0.5) * delta
    }
}

/// The bit whose lattice lies closest to `p`.
fn qim_bit(p: f64, delta: f64) -> u8 {
    let half_delta = delta / 2.0;
    ((p / half_delta).round() as i64).rem_euclid(2) as u8
}

/// Interleaved samples of one 8×8 block, row by row.
struct Block {
    channels: usize,
    color_channels: usize,
    samples: Vec<u8>,
}

impl Block {
    fn read(image: &RasterImage, unit: usize) -> Self {
        let channels = image.channels();
        let width = image.width() as usize;
        let (y0, x0) = block_origin(image, unit);
        let mut samples = Vec::with_capacity(BLOCK * BLOCK * channels);
        for y in y0..y0 + BLOCK {
            let start = (y * width + x0) * channels;
            samples.extend_from_slice(&image.samples()[start..start + BLOCK * channels]);
        }
        Self { channels, color_channels: image.color_channels(), samples }
    }

    fn write(&self, image: &mut RasterImage, unit: usize) {
        let width = image.width() as usize;
        let (y0, x0) = block_origin(image, unit);
        let row_len = BLOCK * self.channels;
        for (row, y) in (y0..y0 + BLOCK).enumerate() {
            let start = (y * width + x0) * self.channels;
            image.samples_mut()[start..start + row_len]
                .copy_from_slice(&self.samples[row * row_len..(row + 1) * row_len]);
        }
    }

    fn luma(&self) -> [f64; 64] {
        let mut out = [0.0f64; 64];
        for (i, px) in self.samples.chunks_exact(self.channels).enumerate() {
            out[i] = if self.color_channels == 3 {
                LUMA_WEIGHTS[0] * px[0] as f64 + LUMA_WEIGHTS[1] * px[1] as f64 + LUMA_WEIGHTS[2] * px[2] as f64
            } else {
                px[0] as f64
            };
        }
        out
    }

    fn coefficient(&self) -> f64 {
        dct::forward(&self.luma())[COEFF]
    }

    /// Move the carrier coefficient onto `bit`'s lattice.
    fn embed(&mut self, bit: u8, delta: f64) {
        let target = quantize_for_bit(self.coefficient(), delta, bit);
        let basis = dct::basis(COEFF_V, COEFF_U);
        let tolerance = delta / 16.0;

        // Unrounded pixel values; each pass adds its correction here and
        // rounds from scratch so sub-LSB corrections accumulate.
        let mut ideal: Vec<f64> = self.samples.iter().map(|&s| s as f64).collect();

        for _ in 0..MAX_REFINE_PASSES {
            let residual = target - self.coefficient();
            if residual.abs() <= tolerance {
                break;
            }
            for (i, b) in basis.iter().enumerate() {
                let d = residual * b;
                for ch in 0..self.color_channels {
                    let idx = i * self.channels + ch;
                    ideal[idx] += d;
                    self.samples[idx] = ideal[idx].round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// `(y, x)` of a block's top-left pixel.
fn block_origin(image: &RasterImage, unit: usize) -> (usize, usize) {
    let bw = blocks_wide(image);
    ((unit / bw) * BLOCK, (unit % bw) * BLOCK)
}

fn traversal(image: &RasterImage, seed: &DerivedSeed, strength: Strength) -> Traversal {
    let method = Method::FrequencyDomain;
    permute::sequence(seed, method.traversal_domain(), method.unit_count(image), strength)
}

/// Embed carrier bits, one per selected block.
///
/// # Errors
/// [`WatermarkError::ImageTooSmall`] if the image has no whole 8×8 block,
/// [`WatermarkError::MessageTooLarge`] if `bits` exceeds the selected blocks.
pub fn embed(image: &mut RasterImage, bits: &[u8], seed: &DerivedSeed, strength: Strength) -> Result<(), WatermarkError> {
    let t = traversal(image, seed, strength);
    if t.unit_count() == 0 || t.is_empty() {
        return Err(WatermarkError::ImageTooSmall);
    }
    if bits.len() > t.len() {
        return Err(WatermarkError::MessageTooLarge);
    }
    let delta = strength.quantization_step();
    tracing::debug!(blocks = t.len(), bits = bits.len(), delta, "frequency-domain embed");

    let work: Vec<(usize, u8)> = t.iter().zip(bits.iter().copied()).collect();
    let image_ref: &RasterImage = image;
    let modify = |&(unit, bit): &(usize, u8)| {
        let mut block = Block::read(image_ref, unit);
        block.embed(bit, delta);
        (unit, block)
    };

    #[cfg(feature = "parallel")]
    let blocks: Vec<(usize, Block)> = work.par_iter().map(modify).collect();
    #[cfg(not(feature = "parallel"))]
    let blocks: Vec<(usize, Block)> = work.iter().map(modify).collect();

    for (unit, block) in &blocks {
        block.write(image, *unit);
    }
    Ok(())
}

/// Read one bit from every selected block.
pub fn extract(image: &RasterImage, seed: &DerivedSeed, strength: Strength) -> Vec<u8> {
    let t = traversal(image, seed, strength);
    let delta = strength.quantization_step();
    let read = |k: usize| qim_bit(Block::read(image, t.unit(k)).coefficient(), delta);

    #[cfg(feature = "parallel")]
    let bits = (0..t.len()).into_par_iter().map(read).collect();
    #[cfg(not(feature = "parallel"))]
    let bits = (0..t.len()).map(read).collect();

    bits
}
