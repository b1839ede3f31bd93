// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Keyed unit traversal.
//!
//! Maps a traversal index `k` to an addressable unit (pixel, sample or block)
//! through a keyed pseudo-random permutation of `[0, unit_count)`. The
//! permutation is a balanced Feistel network over the smallest even power of
//! two covering `unit_count`, with cycle-walking to stay in range. Round keys
//! come from a ChaCha20 PRNG seeded by the derived seed.
//!
//! Because `unit(k)` is a pure function of `(seed, unit_count, k)`, the
//! traversal needs no shared iteration state: extraction re-derives it
//! independently, and chunks of it can be evaluated in parallel.
//!
//! # Cross-platform portability
//!
//! All arithmetic is on `u64` with explicit wrapping, and round keys are drawn
//! with `next_u64`, so the order is identical on 32- and 64-bit targets.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::watermark::crypto::DerivedSeed;
use crate::watermark::strength::Strength;

const ROUNDS: usize = 6;

/// Keyed bijection on `[0, n)`.
#[derive(Debug, Clone)]
pub struct UnitPermutation {
    n: u64,
    half_bits: u32,
    mask: u64,
    keys: [u64; ROUNDS],
}

impl UnitPermutation {
    pub fn new(seed: &[u8; 32], n: usize) -> Self {
        let mut rng = ChaCha20Rng::from_seed(*seed);
        let keys = core::array::from_fn(|_| rng.next_u64());

        let n = n as u64;
        let mut bits = 64 - n.saturating_sub(1).leading_zeros();
        bits = bits.max(2);
        bits += bits & 1;
        let half_bits = bits / 2;
        let mask = if half_bits >= 64 { u64::MAX } else { (1u64 << half_bits) - 1 };

        Self { n, half_bits, mask, keys }
    }

    pub fn len(&self) -> usize {
        self.n as usize
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Image of `i` under the permutation. `i` must be below `len()`.
    pub fn map(&self, i: usize) -> usize {
        debug_assert!((i as u64) < self.n, "index {i} outside permutation of {}", self.n);
        let mut x = i as u64;
        loop {
            x = self.feistel(x);
            if x < self.n {
                return x as usize;
            }
        }
    }

    fn feistel(&self, x: u64) -> u64 {
        let mut left = x >> self.half_bits;
        let mut right = x & self.mask;
        for &key in &self.keys {
            let f = round_fn(right, key) & self.mask;
            let next_right = left ^ f;
            left = right;
            right = next_right;
        }
        (left << self.half_bits) | right
    }
}

/// SplitMix64 finalizer over the key-mixed half block.
fn round_fn(x: u64, key: u64) -> u64 {
    let mut z = x.wrapping_add(key).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Number of units a traversal selects out of `unit_count` at `strength`.
///
/// Monotone in strength, and strictly below `unit_count` for any
/// non-empty image.
pub fn selected_count(unit_count: usize, strength: Strength) -> usize {
    (unit_count as u128 * strength.selection_permille() as u128 / 1000) as usize
}

/// The selected prefix of a keyed permutation.
///
/// Higher strength selects a longer prefix of the same order, so the units
/// chosen at a lower strength are always a subset of those at a higher one.
#[derive(Debug, Clone)]
pub struct Traversal {
    perm: UnitPermutation,
    selected: usize,
}

impl Traversal {
    pub fn new(seed: &[u8; 32], unit_count: usize, strength: Strength) -> Self {
        Self {
            perm: UnitPermutation::new(seed, unit_count),
            selected: selected_count(unit_count, strength),
        }
    }

    /// Number of selected units.
    pub fn len(&self) -> usize {
        self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected == 0
    }

    /// Total addressable units the traversal draws from.
    pub fn unit_count(&self) -> usize {
        self.perm.len()
    }

    /// The `k`-th selected unit.
    pub fn unit(&self, k: usize) -> usize {
        debug_assert!(k < self.selected);
        self.perm.map(k)
    }

    /// Lazily yields the selected units in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.selected).map(move |k| self.perm.map(k))
    }
}

/// Build the traversal for one method. `domain` separates methods so each
/// walks an unrelated order under the same key.
pub fn sequence(seed: &DerivedSeed, domain: &[u8], unit_count: usize, strength: Strength) -> Traversal {
    Traversal::new(&seed.for_domain(domain), unit_count, strength)
}
