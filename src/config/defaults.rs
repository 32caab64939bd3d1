// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the crate. Constants are organized by category.
//!
//! # Categories
//!
//! - **Enhance**: Classical upscale factor and sharpening strength
//! - **Segment**: Background classification thresholds
//! - **Models**: Default learned-model sources and limits
//! - **Runtime**: Download client settings

// ==========================================================================
// Enhance Defaults
// ==========================================================================

/// Default upscale factor for the classical tier.
pub const DEFAULT_SCALE: u32 = crate::domain::processing::scale_bounds::DEFAULT;

/// Default unsharp mask strength.
pub const DEFAULT_SHARPEN_AMOUNT: f32 = 1.5;

/// Minimum unsharp mask strength (no sharpening).
pub const MIN_SHARPEN_AMOUNT: f32 = 0.0;

/// Maximum unsharp mask strength.
pub const MAX_SHARPEN_AMOUNT: f32 = 5.0;

/// Largest enhanced output, in pixels, a job may request (8192 x 8192).
///
/// The classical tier needs about 28 bytes per output pixel.
pub const MAX_OUTPUT_PIXELS: u64 = 8192 * 8192;

// ==========================================================================
// Segment Defaults
// ==========================================================================

/// Maximum RGB distance to a dominant color for a pixel to count as background.
pub const DEFAULT_BACKGROUND_DISTANCE: f32 = 40.0;

/// Confidence below which a learned mask marks a pixel as background.
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.5;

/// Number of dominant colors treated as background candidates.
pub const DEFAULT_DOMINANT_COLORS: usize = 3;

/// Histogram bucket width per channel.
pub const DEFAULT_BUCKET_WIDTH: u8 = 32;

// ==========================================================================
// Model Defaults
// ==========================================================================

/// Sub-pixel CNN super-resolution model (luminance in, 3x luminance out).
pub const DEFAULT_ENHANCE_PRIMARY_URL: &str =
    "https://github.com/onnx/models/raw/main/vision/super_resolution/sub_pixel_cnn_2016/model/super-resolution-10.onnx";

/// File stem of the default enhancement model.
pub const DEFAULT_ENHANCE_PRIMARY_NAME: &str = "super-resolution-10";

/// Declared upscale factor of the default enhancement model.
pub const DEFAULT_ENHANCE_PRIMARY_SCALE: u32 = 3;

/// Fixed input edge of the default enhancement model.
pub const DEFAULT_ENHANCE_PRIMARY_INPUT: u32 = 224;

/// U2-Net (portable) salient object segmentation model.
pub const DEFAULT_SEGMENT_PRIMARY_URL: &str =
    "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2netp.onnx";

/// File stem of the default segmentation model.
pub const DEFAULT_SEGMENT_PRIMARY_NAME: &str = "u2netp";

/// Fixed input edge of the default segmentation model.
pub const DEFAULT_SEGMENT_PRIMARY_INPUT: u32 = 320;

/// Largest input edge a learned tier accepts before deferring to the next tier.
pub const DEFAULT_MAX_INPUT_DIMENSION: u32 = 4096;

// ==========================================================================
// Runtime Defaults
// ==========================================================================

/// User agent sent with model downloads.
pub const DOWNLOAD_USER_AGENT: &str = concat!("LensRefine/", env!("CARGO_PKG_VERSION"));

/// Maximum number of HTTP redirects followed during a model download.
pub const DOWNLOAD_MAX_REDIRECTS: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharpen_defaults_are_ordered() {
        assert!(MIN_SHARPEN_AMOUNT <= DEFAULT_SHARPEN_AMOUNT);
        assert!(DEFAULT_SHARPEN_AMOUNT <= MAX_SHARPEN_AMOUNT);
    }

    #[test]
    fn mask_threshold_is_a_probability() {
        assert!((0.0..=1.0).contains(&DEFAULT_MASK_THRESHOLD));
    }

    #[test]
    fn default_model_urls_point_to_onnx_files() {
        assert!(DEFAULT_ENHANCE_PRIMARY_URL.ends_with(".onnx"));
        assert!(DEFAULT_SEGMENT_PRIMARY_URL.ends_with(".onnx"));
    }
}
