// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Orthonormal 8×8 DCT-II and its inverse.
//!
//! Operates on level-shifted luma (`pixel - 128`). Because the transform is
//! orthonormal, a change of `d` to one coefficient changes the block's pixel
//! energy by exactly `d²`, which keeps QIM step sizes meaningful in pixel
//! units.

use std::sync::OnceLock;

pub const BLOCK: usize = 8;

/// Pre-computed 8×8 cosine table.
/// `COSINE[u][x] = cos((2*x + 1) * u * PI / 16)`
static COSINE: OnceLock<[[f64; 8]; 8]> = OnceLock::new();

/// Normalization: C(0) = 1/sqrt(8), C(u>0) = 1/2.
static NORM: OnceLock<[f64; 8]> = OnceLock::new();

fn cosine_table() -> &'static [[f64; 8]; 8] {
    COSINE.get_or_init(|| {
        let mut table = [[0.0f64; 8]; 8];
        for (u, row) in table.iter_mut().enumerate() {
            for (x, v) in row.iter_mut().enumerate() {
                *v = ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0).cos();
            }
        }
        table
    })
}

fn norm_table() -> &'static [f64; 8] {
    NORM.get_or_init(|| {
        let mut n = [0.5f64; 8];
        n[0] = 1.0 / (8.0f64).sqrt();
        n
    })
}

/// Forward DCT of 64 row-major pixel values (0–255).
/// Output coefficients are row-major, `coeffs[v * 8 + u]`.
pub fn forward(pixels: &[f64; 64]) -> [f64; 64] {
    let cos = cosine_table();
    let c = norm_table();

    // Rows.
    let mut temp = [0.0f64; 64];
    for row in 0..8 {
        for u in 0..8 {
            let mut sum = 0.0;
            for x in 0..8 {
                sum += (pixels[row * 8 + x] - 128.0) * cos[u][x];
            }
            temp[row * 8 + u] = c[u] * sum;
        }
    }

    // Columns.
    let mut coeffs = [0.0f64; 64];
    for col in 0..8 {
        for v in 0..8 {
            let mut sum = 0.0;
            for y in 0..8 {
                sum += temp[y * 8 + col] * cos[v][y];
            }
            coeffs[v * 8 + col] = c[v] * sum;
        }
    }
    coeffs
}

/// Inverse DCT back to pixel values (unclamped, +128 restored).
pub fn inverse(coeffs: &[f64; 64]) -> [f64; 64] {
    let cos = cosine_table();
    let c = norm_table();

    // Columns.
    let mut temp = [0.0f64; 64];
    for col in 0..8 {
        for y in 0..8 {
            let mut sum = 0.0;
            for v in 0..8 {
                sum += c[v] * coeffs[v * 8 + col] * cos[v][y];
            }
            temp[y * 8 + col] = sum;
        }
    }

    // Rows.
    let mut pixels = [0.0f64; 64];
    for row in 0..8 {
        for x in 0..8 {
            let mut sum = 0.0;
            for u in 0..8 {
                sum += c[u] * temp[row * 8 + u] * cos[u][x];
            }
            pixels[row * 8 + x] = sum + 128.0;
        }
    }
    pixels
}

/// Spatial pattern of a single unit coefficient at `(v, u)`: the pixel delta
/// produced by adding 1.0 to that coefficient.
pub fn basis(v: usize, u: usize) -> [f64; 64] {
    let cos = cosine_table();
    let c = norm_table();
    let mut out = [0.0f64; 64];
    for y in 0..8 {
        for x in 0..8 {
            out[y * 8 + x] = c[v] * c[u] * cos[v][y] * cos[u][x];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_lossless() {
        let mut pixels = [0.0f64; 64];
        for (i, p) in pixels.iter_mut().enumerate() {
            *p = ((i * 37 + 11) % 256) as f64;
        }
        let back = inverse(&forward(&pixels));
        for i in 0..64 {
            assert!((back[i] - pixels[i]).abs() < 1e-9, "pixel {i}");
        }
    }

    #[test]
    fn flat_block_has_only_dc() {
        let coeffs = forward(&[200.0; 64]);
        // DC = 8 * mean of the level-shifted block.
        assert!((coeffs[0] - 72.0 * 8.0).abs() < 1e-9);
        for &c in &coeffs[1..] {
            assert!(c.abs() < 1e-9);
        }
    }

    #[test]
    fn basis_matches_inverse_of_unit_coefficient() {
        let mut unit = [0.0f64; 64];
        unit[2 * 8 + 3] = 1.0;
        let via_inverse = inverse(&unit);
        let b = basis(2, 3);
        for i in 0..64 {
            assert!((via_inverse[i] - 128.0 - b[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn basis_has_unit_energy() {
        let energy: f64 = basis(2, 3).iter().map(|v| v * v).sum();
        assert!((energy - 1.0).abs() < 1e-12);
    }
}
