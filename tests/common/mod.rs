// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Synthetic cover images shared by the integration tests.

#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sealmark_core::RasterImage;

/// Photo-like cover: smooth gradients plus mild sensor noise, kept inside
/// 40..=215 so no write ever clamps.
pub fn cover(width: u32, height: u32, channels: u8, seed: u64) -> RasterImage {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity((width * height * channels as u32) as usize);
    for y in 0..height {
        for x in 0..width {
            let fx = x as f64 / width.max(1) as f64;
            let fy = y as f64 / height.max(1) as f64;
            for c in 0..channels {
                if channels % 2 == 0 && c == channels - 1 {
                    samples.push(255);
                    continue;
                }
                let base = 127.0 + 55.0 * ((fx * 6.0 + c as f64).sin() * (fy * 4.0).cos());
                let noise: f64 = rng.gen_range(-12.0..12.0);
                samples.push((base + noise).round().clamp(40.0, 215.0) as u8);
            }
        }
    }
    RasterImage::new(width, height, channels, samples).unwrap()
}

/// PNG-encoded [`cover`].
pub fn cover_png(width: u32, height: u32, channels: u8, seed: u64) -> Vec<u8> {
    cover(width, height, channels, seed).encode_png().unwrap()
}

/// Decode any container and re-encode as baseline JPEG at `quality`.
pub fn recompress_jpeg(bytes: &[u8], quality: u8) -> Vec<u8> {
    let rgb = image::load_from_memory(bytes).unwrap().to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Route engine logs to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}
