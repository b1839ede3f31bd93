// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Owned 8-bit raster and the container codecs around it.
//!
//! Any format the `image` crate decodes is accepted on input and normalized
//! to 8-bit gray, gray+alpha, RGB or RGBA. Output is always lossless PNG so
//! pixel-domain watermarks survive the write.

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageError, ImageReader, Limits};

use crate::watermark::error::WatermarkError;

/// Size limits applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_input_bytes: usize,
    pub max_dimension: u32,
    pub max_pixels: u64,
}

/// Interleaved 8-bit samples, row-major, `channels` per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u8>,
}

impl RasterImage {
    /// Wrap raw samples.
    ///
    /// # Errors
    /// [`WatermarkError::UnsupportedImageFormat`] for a channel count outside
    /// `1..=4` or a sample buffer that does not match the dimensions.
    pub fn new(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> Result<Self, WatermarkError> {
        if !(1..=4).contains(&channels) {
            return Err(WatermarkError::UnsupportedImageFormat);
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channels as usize))
            .ok_or(WatermarkError::ImageTooLarge)?;
        if samples.len() != expected {
            return Err(WatermarkError::UnsupportedImageFormat);
        }
        Ok(Self { width, height, channels, samples })
    }

    /// Normalize a decoded image to 8 bits per sample, keeping alpha and
    /// color where the source has them.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        let (channels, samples) = match img {
            DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (2, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
            other => {
                let color = other.color();
                match (color.has_color(), color.has_alpha()) {
                    (false, false) => (1, other.to_luma8().into_raw()),
                    (false, true) => (2, other.to_luma_alpha8().into_raw()),
                    (true, false) => (3, other.to_rgb8().into_raw()),
                    (true, true) => (4, other.to_rgba8().into_raw()),
                }
            }
        };
        Self { width, height, channels, samples }
    }

    /// Decode container bytes under `limits`.
    ///
    /// # Errors
    /// - [`WatermarkError::ImageTooLarge`] if the input, its dimensions or its
    ///   pixel count exceed `limits`.
    /// - [`WatermarkError::UnsupportedImageFormat`] if the format is not
    ///   recognized or the data does not decode.
    pub fn decode(bytes: &[u8], limits: &DecodeLimits) -> Result<Self, WatermarkError> {
        if bytes.len() > limits.max_input_bytes {
            return Err(WatermarkError::ImageTooLarge);
        }
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|_| WatermarkError::UnsupportedImageFormat)?;
        if reader.format().is_none() {
            return Err(WatermarkError::UnsupportedImageFormat);
        }

        let mut image_limits = Limits::default();
        image_limits.max_image_width = Some(limits.max_dimension);
        image_limits.max_image_height = Some(limits.max_dimension);
        image_limits.max_alloc = Some(limits.max_pixels.saturating_mul(16));
        reader.limits(image_limits);

        let img = reader.decode().map_err(|e| match e {
            ImageError::Limits(_) => WatermarkError::ImageTooLarge,
            ImageError::IoError(_) => WatermarkError::Image(e),
            _ => WatermarkError::UnsupportedImageFormat,
        })?;
        if img.width() as u64 * img.height() as u64 > limits.max_pixels {
            return Err(WatermarkError::ImageTooLarge);
        }
        Ok(Self::from_dynamic(img))
    }

    /// Encode as PNG.
    ///
    /// # Errors
    /// [`WatermarkError::Encode`] if the PNG encoder fails.
    pub fn encode_png(&self) -> Result<Vec<u8>, WatermarkError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(&self.samples, self.width, self.height, self.color_type())
            .map_err(WatermarkError::Encode)?;
        Ok(out)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels as usize
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [u8] {
        &mut self.samples
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn has_color(&self) -> bool {
        self.channels >= 3
    }

    pub fn has_alpha(&self) -> bool {
        self.channels == 2 || self.channels == 4
    }

    /// Non-alpha channels per pixel: 3 for color, 1 for gray.
    pub fn color_channels(&self) -> usize {
        if self.has_color() { 3 } else { 1 }
    }

    /// Sample `channel` of pixel `pixel` (row-major pixel index).
    pub fn sample(&self, pixel: usize, channel: usize) -> u8 {
        self.samples[pixel * self.channels as usize + channel]
    }

    pub fn set_sample(&mut self, pixel: usize, channel: usize, value: u8) {
        self.samples[pixel * self.channels as usize + channel] = value;
    }

    fn color_type(&self) -> ExtendedColorType {
        match self.channels {
            1 => ExtendedColorType::L8,
            2 => ExtendedColorType::La8,
            3 => ExtendedColorType::Rgb8,
            _ => ExtendedColorType::Rgba8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: DecodeLimits = DecodeLimits { max_input_bytes: 1 << 20, max_dimension: 256, max_pixels: 256 * 256 };

    fn gradient(w: u32, h: u32, channels: u8) -> RasterImage {
        let samples = (0..(w * h * channels as u32)).map(|i| (i % 251) as u8).collect();
        RasterImage::new(w, h, channels, samples).unwrap()
    }

    #[test]
    fn png_roundtrip_all_layouts() {
        for channels in 1..=4u8 {
            let img = gradient(17, 9, channels);
            let png = img.encode_png().unwrap();
            assert_eq!(RasterImage::decode(&png, &LIMITS).unwrap(), img, "channels={channels}");
        }
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(RasterImage::new(4, 4, 3, vec![0; 47]).is_err());
        assert!(RasterImage::new(4, 4, 5, vec![0; 80]).is_err());
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(matches!(
            RasterImage::decode(b"definitely not an image", &LIMITS),
            Err(WatermarkError::UnsupportedImageFormat)
        ));
    }

    #[test]
    fn rejects_oversized_dimensions() {
        let png = gradient(300, 2, 1).encode_png().unwrap();
        assert!(matches!(RasterImage::decode(&png, &LIMITS), Err(WatermarkError::ImageTooLarge)));
    }

    #[test]
    fn rejects_oversized_input() {
        let png = gradient(64, 64, 3).encode_png().unwrap();
        let tight = DecodeLimits { max_input_bytes: 16, ..LIMITS };
        assert!(matches!(RasterImage::decode(&png, &tight), Err(WatermarkError::ImageTooLarge)));
    }

    #[test]
    fn channel_queries() {
        let rgba = gradient(2, 2, 4);
        assert!(rgba.has_color() && rgba.has_alpha());
        assert_eq!(rgba.color_channels(), 3);
        let la = gradient(2, 2, 2);
        assert!(!la.has_color() && la.has_alpha());
        assert_eq!(la.color_channels(), 1);
    }

    #[test]
    fn sample_addressing() {
        let mut img = gradient(3, 3, 3);
        img.set_sample(4, 2, 99);
        assert_eq!(img.samples()[4 * 3 + 2], 99);
        assert_eq!(img.sample(4, 2), 99);
    }
}
