// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Least-significant-bit carriers.
//!
//! **Bit plane**: one carrier bit per selected pixel, in the LSB of the blue
//! channel (the only channel of a gray image).
//!
//! **Redundant bit plane**: the unit is a single color sample, so a pixel
//! holds up to three carrier bits. The codec has already repeated every
//! frame bit `r` times, and consecutive traversal positions are distinct
//! units, so each frame bit lands on `r` different samples scattered over
//! the image. Extraction reads every selected unit and leaves the vote to
//! the codec.
//!
//! Alpha is never modified.

use crate::raster::RasterImage;
use crate::watermark::crypto::DerivedSeed;
use crate::watermark::error::WatermarkError;
use crate::watermark::method::Method;
use crate::watermark::permute::{self, Traversal};
use crate::watermark::strength::Strength;

/// Channel carrying the bit-plane watermark.
fn plane_channel(image: &RasterImage) -> usize {
    if image.has_color() { 2 } else { 0 }
}

/// Units for [`Method::BitPlane`]: one per pixel.
pub fn plane_units(image: &RasterImage) -> usize {
    image.pixel_count()
}

/// Units for [`Method::RedundantBitPlane`]: one per color sample.
pub fn sample_units(image: &RasterImage) -> usize {
    image.pixel_count() * image.color_channels()
}

/// `(pixel, channel)` of a redundant-method unit.
fn sample_address(image: &RasterImage, unit: usize) -> (usize, usize) {
    let cc = image.color_channels();
    (unit / cc, unit % cc)
}

fn traversal(method: Method, image: &RasterImage, seed: &DerivedSeed, strength: Strength) -> Traversal {
    permute::sequence(seed, method.traversal_domain(), method.unit_count(image), strength)
}

fn check_capacity(t: &Traversal, bits: usize) -> Result<(), WatermarkError> {
    if t.unit_count() == 0 || t.is_empty() {
        return Err(WatermarkError::ImageTooSmall);
    }
    if bits > t.len() {
        return Err(WatermarkError::MessageTooLarge);
    }
    Ok(())
}

fn set_lsb(image: &mut RasterImage, pixel: usize, channel: usize, bit: u8) {
    let v = image.sample(pixel, channel);
    image.set_sample(pixel, channel, (v & 0xFE) | (bit & 1));
}

/// Embed carrier bits into the bit plane.
///
/// # Errors
/// [`WatermarkError::ImageTooSmall`] or [`WatermarkError::MessageTooLarge`]
/// when the selected pixels cannot hold `bits`.
pub fn embed_bit_plane(
    image: &mut RasterImage,
    bits: &[u8],
    seed: &DerivedSeed,
    strength: Strength,
) -> Result<(), WatermarkError> {
    let t = traversal(Method::BitPlane, image, seed, strength);
    check_capacity(&t, bits.len())?;
    tracing::debug!(units = t.len(), bits = bits.len(), "bit-plane embed");

    let channel = plane_channel(image);
    for (&bit, pixel) in bits.iter().zip(t.iter()) {
        set_lsb(image, pixel, channel, bit);
    }
    Ok(())
}

/// Read the bit plane over every selected pixel.
pub fn extract_bit_plane(image: &RasterImage, seed: &DerivedSeed, strength: Strength) -> Vec<u8> {
    let t = traversal(Method::BitPlane, image, seed, strength);
    let channel = plane_channel(image);
    t.iter().map(|pixel| image.sample(pixel, channel) & 1).collect()
}

/// Embed an already-repeated carrier bitstream over color samples.
///
/// # Errors
/// [`WatermarkError::ImageTooSmall`] or [`WatermarkError::MessageTooLarge`]
/// when the selected samples cannot hold `bits`.
pub fn embed_redundant(
    image: &mut RasterImage,
    bits: &[u8],
    seed: &DerivedSeed,
    strength: Strength,
) -> Result<(), WatermarkError> {
    let t = traversal(Method::RedundantBitPlane, image, seed, strength);
    check_capacity(&t, bits.len())?;
    tracing::debug!(
        units = t.len(),
        bits = bits.len(),
        redundancy = strength.bit_redundancy(),
        "redundant bit-plane embed"
    );

    for (&bit, unit) in bits.iter().zip(t.iter()) {
        let (pixel, channel) = sample_address(image, unit);
        set_lsb(image, pixel, channel, bit);
    }
    Ok(())
}

/// Read every selected sample's LSB, in traversal order.
pub fn extract_redundant(image: &RasterImage, seed: &DerivedSeed, strength: Strength) -> Vec<u8> {
    let t = traversal(Method::RedundantBitPlane, image, seed, strength);
    t.iter()
        .map(|unit| {
            let (pixel, channel) = sample_address(image, unit);
            image.sample(pixel, channel) & 1
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> DerivedSeed {
        DerivedSeed::from_bytes([0x5A; 32])
    }

    fn strength(s: u8) -> Strength {
        Strength::new(s).unwrap()
    }

    fn noise_image(w: u32, h: u32, channels: u8) -> RasterImage {
        let n = (w * h * channels as u32) as usize;
        let samples = (0..n as u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 11) as u8).collect();
        RasterImage::new(w, h, channels, samples).unwrap()
    }

    fn pattern(n: usize) -> Vec<u8> {
        (0..n).map(|i| ((i * 7 + 3) % 5 < 2) as u8).collect()
    }

    #[test]
    fn bit_plane_roundtrip() {
        let mut img = noise_image(32, 32, 3);
        let bits = pattern(300);
        embed_bit_plane(&mut img, &bits, &seed(), strength(50)).unwrap();
        let read = extract_bit_plane(&img, &seed(), strength(50));
        assert_eq!(&read[..bits.len()], &bits[..]);
    }

    #[test]
    fn bit_plane_touches_only_blue_lsb() {
        let original = noise_image(16, 16, 4);
        let mut img = original.clone();
        embed_bit_plane(&mut img, &pattern(100), &seed(), strength(80)).unwrap();
        for (i, (&a, &b)) in original.samples().iter().zip(img.samples()).enumerate() {
            if i % 4 == 2 {
                assert!(a ^ b <= 1, "sample {i} changed by more than the LSB");
            } else {
                assert_eq!(a, b, "sample {i} outside the blue channel changed");
            }
        }
    }

    #[test]
    fn gray_uses_channel_zero() {
        let mut img = noise_image(16, 16, 2);
        let alpha_before: Vec<u8> = img.samples().iter().skip(1).step_by(2).copied().collect();
        let bits = pattern(64);
        embed_bit_plane(&mut img, &bits, &seed(), strength(50)).unwrap();
        let alpha_after: Vec<u8> = img.samples().iter().skip(1).step_by(2).copied().collect();
        assert_eq!(alpha_before, alpha_after);
        assert_eq!(&extract_bit_plane(&img, &seed(), strength(50))[..64], &bits[..]);
    }

    #[test]
    fn redundant_roundtrip_spreads_over_channels() {
        let original = noise_image(24, 24, 3);
        let mut img = original.clone();
        let bits = pattern(900);
        embed_redundant(&mut img, &bits, &seed(), strength(60)).unwrap();
        assert_eq!(&extract_redundant(&img, &seed(), strength(60))[..900], &bits[..]);

        let touched = |c: usize| {
            original.samples().iter().zip(img.samples()).skip(c).step_by(3).any(|(a, b)| a != b)
        };
        assert!(touched(0) && touched(1) && touched(2));
    }

    #[test]
    fn redundant_survives_one_flipped_copy_per_bit() {
        use crate::watermark::repetition::{majority_decode, repeat_bits};

        let s = strength(50);
        let r = s.bit_redundancy();
        let bits = pattern(100);
        let mut img = noise_image(32, 32, 3);
        embed_redundant(&mut img, &repeat_bits(&bits, r), &seed(), s).unwrap();

        let t = traversal(Method::RedundantBitPlane, &img, &seed(), s);
        for k in 0..bits.len() {
            let (pixel, channel) = sample_address(&img, t.unit(k * r + k % r));
            let v = img.sample(pixel, channel);
            img.set_sample(pixel, channel, v ^ 1);
        }

        let read = extract_redundant(&img, &seed(), s);
        assert_eq!(majority_decode(&read[..bits.len() * r], r), bits);
    }

    #[test]
    fn over_capacity_is_rejected() {
        let mut img = noise_image(8, 8, 3);
        let before = img.clone();
        let err = embed_bit_plane(&mut img, &pattern(64), &seed(), strength(100)).unwrap_err();
        assert!(matches!(err, WatermarkError::MessageTooLarge));
        assert_eq!(img, before);
    }

    #[test]
    fn empty_image_is_too_small() {
        let mut img = RasterImage::new(0, 0, 3, Vec::new()).unwrap();
        let err = embed_redundant(&mut img, &[1], &seed(), strength(50)).unwrap_err();
        assert!(matches!(err, WatermarkError::ImageTooSmall));
        assert!(extract_redundant(&img, &seed(), strength(50)).is_empty());
    }

    #[test]
    fn wrong_seed_reads_other_units() {
        let mut img = noise_image(32, 32, 3);
        let bits = pattern(400);
        embed_bit_plane(&mut img, &bits, &seed(), strength(50)).unwrap();
        let other = DerivedSeed::from_bytes([0x11; 32]);
        let read = extract_bit_plane(&img, &other, strength(50));
        let agree = read.iter().zip(&bits).filter(|(a, b)| a == b).count();
        assert!(agree < 300, "{agree}/400 agree under a different seed");
    }
}
