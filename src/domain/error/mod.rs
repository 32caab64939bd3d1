// SPDX-License-Identifier: MPL-2.0
//! Domain error types.
//!
//! This module provides pure domain error types that are independent
//! of external crates and infrastructure concerns.

use std::fmt;

/// Raised when pixel or mask data does not describe a valid image shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Width or height is zero.
    ZeroDimension {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Buffer length does not match `width * height * channels`.
    LengthMismatch {
        /// Length implied by the dimensions.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::ZeroDimension { width, height } => {
                write!(f, "Image has a zero dimension: {width}x{height}")
            }
            ShapeError::LengthMismatch { expected, actual } => {
                write!(f, "Buffer length mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for ShapeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_dimensions() {
        let err = ShapeError::ZeroDimension {
            width: 0,
            height: 12,
        };
        assert!(err.to_string().contains("0x12"));
    }
}
