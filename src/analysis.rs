// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Key-independent image inspection.

use crate::raster::RasterImage;
use crate::watermark::metadata;

/// Bit-plane variance below which the LSBs look manipulated. An unbiased
/// plane has variance 0.25.
const LOW_LSB_VARIANCE: f64 = 0.2;

/// Mean and standard deviation of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelStats {
    pub mean: f64,
    pub std_dev: f64,
}

/// Summary of an encoded image.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageAnalysis {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub has_alpha: bool,
    /// Container format by file extension, if recognized.
    pub format: Option<String>,
    pub size_bytes: usize,
    /// Per-channel statistics, alpha included.
    pub channel_stats: Vec<ChannelStats>,
    /// Variance of the bit-plane carrier channel's LSBs.
    pub lsb_variance: f64,
    /// `lsb_variance` is low enough to suggest LSB manipulation.
    pub low_lsb_variance: bool,
    /// A metadata tag under the engine keyword is present.
    pub metadata_tag_present: bool,
}

/// Analyze a decoded image together with its container bytes.
pub fn analyze(container: &[u8], image: &RasterImage, keyword: &str) -> ImageAnalysis {
    let channels = image.channels();
    let channel_stats = (0..channels).map(|c| channel_stats(image, c)).collect();

    let carrier = if image.has_color() { 2 } else { 0 };
    let lsb_variance = lsb_variance(image, carrier);

    ImageAnalysis {
        width: image.width(),
        height: image.height(),
        channels,
        has_alpha: image.has_alpha(),
        format: image::guess_format(container)
            .ok()
            .and_then(|f| f.extensions_str().first().map(|e| e.to_string())),
        size_bytes: container.len(),
        channel_stats,
        lsb_variance,
        low_lsb_variance: image.pixel_count() > 0 && lsb_variance < LOW_LSB_VARIANCE,
        metadata_tag_present: metadata::has_tag(container, keyword),
    }
}

fn channel_stats(image: &RasterImage, channel: usize) -> ChannelStats {
    let n = image.pixel_count();
    if n == 0 {
        return ChannelStats { mean: 0.0, std_dev: 0.0 };
    }
    let (sum, sum_sq) = (0..n).fold((0.0f64, 0.0f64), |(s, sq), p| {
        let v = image.sample(p, channel) as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    ChannelStats { mean, std_dev: var.sqrt() }
}

fn lsb_variance(image: &RasterImage, channel: usize) -> f64 {
    let n = image.pixel_count();
    if n == 0 {
        return 0.0;
    }
    let ones = (0..n).filter(|&p| image.sample(p, channel) & 1 == 1).count();
    let p = ones as f64 / n as f64;
    p * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_gray_image() {
        let img = RasterImage::new(4, 4, 1, vec![100; 16]).unwrap();
        let png = img.encode_png().unwrap();
        let a = analyze(&png, &img, "sealmark");
        assert_eq!(a.format.as_deref(), Some("png"));
        assert_eq!(a.channels, 1);
        assert_eq!(a.channel_stats[0], ChannelStats { mean: 100.0, std_dev: 0.0 });
        // All LSBs zero.
        assert_eq!(a.lsb_variance, 0.0);
        assert!(a.low_lsb_variance);
        assert!(!a.metadata_tag_present);
    }

    #[test]
    fn balanced_lsbs_on_blue() {
        let samples: Vec<u8> = (0..64u32).flat_map(|i| [10, 20, 30 + (i % 2) as u8]).collect();
        let img = RasterImage::new(8, 8, 3, samples).unwrap();
        let a = analyze(&[], &img, "sealmark");
        assert!((a.lsb_variance - 0.25).abs() < 1e-12);
        assert!(!a.low_lsb_variance);
        assert_eq!(a.format, None);
        assert!((a.channel_stats[2].mean - 30.5).abs() < 1e-12);
        assert!((a.channel_stats[2].std_dev - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sees_metadata_tag() {
        let img = RasterImage::new(4, 4, 3, vec![50; 48]).unwrap();
        let png = img.encode_png().unwrap();
        let tagged = metadata::insert_tag(&png, "sealmark", &[1, 2, 3]).unwrap();
        assert!(analyze(&tagged, &img, "sealmark").metadata_tag_present);
    }
}
