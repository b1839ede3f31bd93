// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Strength parameter and the curves derived from it.
//!
//! Every curve here is monotone non-decreasing in strength and saturates at
//! the top of the range, so raising strength never reduces robustness.

use crate::watermark::error::WatermarkError;

/// Caller-tunable robustness/imperceptibility trade-off in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Strength(u8);

impl Strength {
    pub const MIN: Strength = Strength(1);
    pub const MAX: Strength = Strength(100);

    /// Validate a raw strength value.
    ///
    /// # Errors
    /// [`WatermarkError::InvalidStrength`] if `value` is 0 or above 100.
    pub fn new(value: u8) -> Result<Self, WatermarkError> {
        if (1..=100).contains(&value) {
            Ok(Self(value))
        } else {
            Err(WatermarkError::InvalidStrength(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Share of addressable units the traversal selects, in per-mille.
    /// Ranges from 100 (10 %) at strength 1 to 950 (95 %) at strength 100.
    pub fn selection_permille(self) -> u64 {
        100 + 850 * (self.0 as u64 - 1) / 99
    }

    /// QIM step for frequency-domain embedding, in DCT coefficient units.
    pub fn quantization_step(self) -> f64 {
        12.0 + 36.0 * (self.0 as f64 - 1.0) / 99.0
    }

    /// Copies per payload bit for the redundant bit-plane method.
    /// Always odd (3, 5, 7, 9) so majority votes never tie.
    pub fn bit_redundancy(self) -> usize {
        3 + 2 * ((self.0 as usize - 1) / 33)
    }
}

impl Default for Strength {
    fn default() -> Self {
        Self(crate::watermark::DEFAULT_STRENGTH)
    }
}

impl TryFrom<u8> for Strength {
    type Error = WatermarkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> impl Iterator<Item = Strength> {
        (1..=100u8).map(|s| Strength::new(s).unwrap())
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(Strength::new(0), Err(WatermarkError::InvalidStrength(0))));
        assert!(matches!(Strength::new(101), Err(WatermarkError::InvalidStrength(101))));
        assert!(Strength::new(1).is_ok());
        assert!(Strength::new(100).is_ok());
    }

    #[test]
    fn curves_are_monotone() {
        let s: Vec<Strength> = all().collect();
        for pair in s.windows(2) {
            assert!(pair[1].selection_permille() >= pair[0].selection_permille());
            assert!(pair[1].quantization_step() >= pair[0].quantization_step());
            assert!(pair[1].bit_redundancy() >= pair[0].bit_redundancy());
        }
    }

    #[test]
    fn curve_endpoints() {
        assert_eq!(Strength::MIN.selection_permille(), 100);
        assert_eq!(Strength::MAX.selection_permille(), 950);
        assert_eq!(Strength::MIN.quantization_step(), 12.0);
        assert_eq!(Strength::MAX.quantization_step(), 48.0);
        assert_eq!(Strength::MIN.bit_redundancy(), 3);
        assert_eq!(Strength::new(50).unwrap().bit_redundancy(), 5);
        assert_eq!(Strength::MAX.bit_redundancy(), 9);
    }

    #[test]
    fn redundancy_is_odd() {
        for s in all() {
            assert_eq!(s.bit_redundancy() % 2, 1, "strength {}", s.get());
        }
    }
}
