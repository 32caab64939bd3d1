// SPDX-License-Identifier: MPL-2.0
//! Processing newtypes.
//!
//! This module provides type-safe wrappers for processing values,
//! ensuring they are always within valid ranges.

// =============================================================================
// ProgressPercent
// =============================================================================

/// Completion percentage of a job, guaranteed to be within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ProgressPercent(u8);

impl ProgressPercent {
    /// 0%.
    pub const ZERO: Self = Self(0);
    /// 100%.
    pub const COMPLETE: Self = Self(100);

    /// Creates a new percentage, clamping the value to `0..=100`.
    #[must_use]
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Returns the raw percentage value.
    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Returns `true` at 100%.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self.0 == 100
    }
}

// =============================================================================
// Scale Factor Bounds
// =============================================================================

/// Upscale factor bounds (1x to 8x).
pub mod scale_bounds {
    /// Minimum scale factor.
    pub const MIN: u32 = 1;
    /// Maximum scale factor.
    pub const MAX: u32 = 8;
    /// Default scale factor for the classical tier.
    pub const DEFAULT: u32 = 2;
}

// =============================================================================
// ScaleFactor
// =============================================================================

/// Integer upscale factor, guaranteed to be within valid range (1x–8x).
///
/// # Example
///
/// ```
/// use lens_refine::domain::processing::ScaleFactor;
///
/// let scale = ScaleFactor::new(2);
/// assert_eq!(scale.apply_to_dimensions(100, 50), (200, 100));
/// assert_eq!(ScaleFactor::new(0).value(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleFactor(u32);

impl ScaleFactor {
    /// Creates a new scale factor, clamping the value to the valid range.
    #[must_use]
    pub fn new(factor: u32) -> Self {
        Self(factor.clamp(scale_bounds::MIN, scale_bounds::MAX))
    }

    /// Returns the raw factor.
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }

    /// Applies the factor to the given dimensions, saturating at `u32::MAX`.
    #[must_use]
    pub fn apply_to_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        (width.saturating_mul(self.0), height.saturating_mul(self.0))
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self(scale_bounds::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percent_clamps_to_hundred() {
        assert_eq!(ProgressPercent::new(250).value(), 100);
        assert!(ProgressPercent::new(100).is_complete());
        assert!(!ProgressPercent::ZERO.is_complete());
    }

    #[test]
    fn progress_percent_orders_by_value() {
        assert!(ProgressPercent::new(10) < ProgressPercent::new(20));
    }

    #[test]
    fn scale_factor_clamps_to_bounds() {
        assert_eq!(ScaleFactor::new(0).value(), scale_bounds::MIN);
        assert_eq!(ScaleFactor::new(99).value(), scale_bounds::MAX);
        assert_eq!(ScaleFactor::default().value(), 2);
    }

    #[test]
    fn scale_factor_applies_to_dimensions() {
        assert_eq!(ScaleFactor::new(3).apply_to_dimensions(10, 20), (30, 60));
    }
}
