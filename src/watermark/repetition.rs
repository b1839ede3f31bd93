// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Bit repetition and majority voting.
//!
//! Each bit is repeated `r` times contiguously, so copy `j` of bit `i` sits at
//! position `i * r + j`. Consecutive traversal units therefore form one
//! reserved group per payload bit.
//!
//! Tie-break: when `r` is even and a group splits evenly, the vote is 0.

/// Repeat every bit `r` times. `r <= 1` returns the input unchanged.
pub fn repeat_bits(bits: &[u8], r: usize) -> Vec<u8> {
    if r <= 1 {
        return bits.to_vec();
    }
    let mut out = Vec::with_capacity(bits.len() * r);
    for &bit in bits {
        out.extend(std::iter::repeat(bit & 1).take(r));
    }
    out
}

/// Majority vote over each group of `r` bits.
///
/// A trailing incomplete group is dropped. Ties resolve to 0.
pub fn majority_decode(bits: &[u8], r: usize) -> Vec<u8> {
    if r <= 1 {
        return bits.iter().map(|b| b & 1).collect();
    }
    bits.chunks_exact(r)
        .map(|group| {
            let ones = group.iter().filter(|&&b| b & 1 == 1).count();
            u8::from(ones * 2 > r)
        })
        .collect()
}

/// Fraction of copies that agree with the voted bit, averaged over groups.
/// 1.0 for a pristine read; falls toward 0.5 as the carrier degrades.
pub fn agreement(bits: &[u8], r: usize) -> f64 {
    if r <= 1 || bits.len() < r {
        return 1.0;
    }
    let groups = bits.len() / r;
    let agreeing: usize = bits
        .chunks_exact(r)
        .map(|group| {
            let ones = group.iter().filter(|&&b| b & 1 == 1).count();
            ones.max(r - ones)
        })
        .sum();
    agreeing as f64 / (groups * r) as f64
}
