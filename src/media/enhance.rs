// SPDX-License-Identifier: MPL-2.0
//! Deterministic image enhancement: bicubic upscale followed by unsharp masking.
//!
//! This is the last tier of the enhancement pipeline. It has no model
//! dependency and cannot fail for a valid [`PixelBuffer`].
//!
//! # Algorithm
//!
//! 1. Every destination pixel `(x, y)` maps to source `(x / scale, y / scale)`
//!    and is interpolated from the surrounding 4x4 neighborhood with the
//!    cubic convolution kernel (see [`cubic_weight`]). Source coordinates are
//!    clamped to the image (edge replication).
//! 2. The upscaled image is sharpened with an unsharp mask whose blur is
//!    approximated by three 3x3 box-blur passes.

use crate::config::defaults::{DEFAULT_SHARPEN_AMOUNT, MAX_SHARPEN_AMOUNT, MIN_SHARPEN_AMOUNT};
use crate::domain::media::{PixelBuffer, CHANNELS};
use crate::domain::processing::ScaleFactor;

/// Number of box-blur passes approximating a Gaussian.
pub const BLUR_PASSES: usize = 3;

/// Cubic convolution kernel (Keys, `a = -0.5`).
///
/// `w(0) = 1`, `w(±1) = 0`, `w(±2) = 0` and the kernel is continuous at `|t| = 1`.
#[must_use]
pub fn cubic_weight(t: f32) -> f32 {
    let abs = t.abs();
    if abs <= 1.0 {
        1.5 * abs * abs * abs - 2.5 * abs * abs + 1.0
    } else if abs < 2.0 {
        -0.5 * abs * abs * abs + 2.5 * abs * abs - 4.0 * abs + 2.0
    } else {
        0.0
    }
}

/// Rounds and clamps an accumulated channel value into a byte.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn to_channel(value: f32) -> u8 {
    // Clamp guarantees the value is in 0.0..=255.0
    value.round().clamp(0.0, 255.0) as u8
}

/// Upscales an image by an integer factor with bicubic interpolation.
///
/// All four channels are interpolated. With `scale = 1` the input is
/// reproduced exactly.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_precision_loss)]
pub fn bicubic_upscale(image: &PixelBuffer, scale: ScaleFactor) -> PixelBuffer {
    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = scale.apply_to_dimensions(src_w, src_h);
    let factor = scale.value() as f32;
    let src = image.rgba_bytes();
    let max_x = i64::from(src_w) - 1;
    let max_y = i64::from(src_h) - 1;

    let mut out = vec![0u8; (dst_w as usize) * (dst_h as usize) * CHANNELS];

    for y in 0..dst_h {
        let src_y = y as f32 / factor;
        let y0 = src_y.floor();
        let dy = src_y - y0;
        let y0 = y0 as i64;

        // Row weights and clamped row indices are shared by the whole row.
        let mut wy = [0.0f32; 4];
        let mut rows = [0usize; 4];
        for (k, j) in (-1i64..=2).enumerate() {
            wy[k] = cubic_weight(j as f32 - dy);
            rows[k] = (y0 + j).clamp(0, max_y) as usize;
        }

        for x in 0..dst_w {
            let src_x = x as f32 / factor;
            let x0 = src_x.floor();
            let dx = src_x - x0;
            let x0 = x0 as i64;

            let mut acc = [0.0f32; CHANNELS];
            for i in -1i64..=2 {
                let wx = cubic_weight(i as f32 - dx);
                if wx == 0.0 {
                    continue;
                }
                let sx = (x0 + i).clamp(0, max_x) as usize;
                for (row, w_row) in rows.iter().zip(wy.iter()) {
                    let weight = wx * w_row;
                    if weight == 0.0 {
                        continue;
                    }
                    let idx = (row * src_w as usize + sx) * CHANNELS;
                    for (c, slot) in acc.iter_mut().enumerate() {
                        *slot += f32::from(src[idx + c]) * weight;
                    }
                }
            }

            let dst_idx = ((y as usize) * (dst_w as usize) + x as usize) * CHANNELS;
            for (c, value) in acc.iter().enumerate() {
                out[dst_idx + c] = to_channel(*value);
            }
        }
    }

    PixelBuffer::new(dst_w, dst_h, out)
}

/// Approximates a Gaussian blur of the RGB channels.
///
/// Each pass averages the 3 horizontal neighbors and then the 3 vertical
/// neighbors, clamping at the edges. Returns one interleaved RGB `f32`
/// plane (3 values per pixel).
#[must_use]
pub fn box_blur_rgb(image: &PixelBuffer, passes: usize) -> Vec<f32> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    let mut current: Vec<f32> = image
        .rgba_bytes()
        .chunks_exact(CHANNELS)
        .flat_map(|px| [f32::from(px[0]), f32::from(px[1]), f32::from(px[2])])
        .collect();
    let mut scratch = vec![0.0f32; current.len()];

    for _ in 0..passes {
        // Horizontal
        for y in 0..height {
            for x in 0..width {
                let left = x.saturating_sub(1);
                let right = (x + 1).min(width - 1);
                for c in 0..3 {
                    let sum = current[(y * width + left) * 3 + c]
                        + current[(y * width + x) * 3 + c]
                        + current[(y * width + right) * 3 + c];
                    scratch[(y * width + x) * 3 + c] = sum / 3.0;
                }
            }
        }
        // Vertical
        for y in 0..height {
            let up = y.saturating_sub(1);
            let down = (y + 1).min(height - 1);
            for x in 0..width {
                for c in 0..3 {
                    let sum = scratch[(up * width + x) * 3 + c]
                        + scratch[(y * width + x) * 3 + c]
                        + scratch[(down * width + x) * 3 + c];
                    current[(y * width + x) * 3 + c] = sum / 3.0;
                }
            }
        }
    }

    current
}

/// Sharpens an image: `out = clamp(orig + amount * (orig - blurred))`.
///
/// Only color channels are sharpened; alpha is copied unchanged.
#[must_use]
pub fn unsharp_mask(image: &PixelBuffer, amount: f32) -> PixelBuffer {
    let blurred = box_blur_rgb(image, BLUR_PASSES);
    let mut out = image.clone();

    for (px, blur) in out
        .rgba_bytes_mut()
        .chunks_exact_mut(CHANNELS)
        .zip(blurred.chunks_exact(3))
    {
        for c in 0..3 {
            let original = f32::from(px[c]);
            px[c] = to_channel(original + amount * (original - blur[c]));
        }
    }

    out
}

/// Classical enhancement tier: bicubic upscale then unsharp mask.
///
/// # Example
///
/// ```
/// use lens_refine::domain::media::PixelBuffer;
/// use lens_refine::domain::processing::ScaleFactor;
/// use lens_refine::media::enhance::ClassicalEnhancer;
///
/// let input = PixelBuffer::filled(4, 3, [200, 100, 50, 255]);
/// let output = ClassicalEnhancer::new(ScaleFactor::new(2), 1.5).enhance(&input);
///
/// assert_eq!(output.dimensions(), (8, 6));
/// assert_eq!(output.pixel(5, 5), [200, 100, 50, 255]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassicalEnhancer {
    scale: ScaleFactor,
    amount: f32,
}

impl Default for ClassicalEnhancer {
    fn default() -> Self {
        Self::new(ScaleFactor::default(), DEFAULT_SHARPEN_AMOUNT)
    }
}

impl ClassicalEnhancer {
    /// Creates an enhancer. `amount` is clamped to the accepted range; a
    /// non-finite amount falls back to the default.
    #[must_use]
    pub fn new(scale: ScaleFactor, amount: f32) -> Self {
        let amount = if amount.is_finite() {
            amount.clamp(MIN_SHARPEN_AMOUNT, MAX_SHARPEN_AMOUNT)
        } else {
            DEFAULT_SHARPEN_AMOUNT
        };
        Self { scale, amount }
    }

    /// Returns the upscale factor.
    #[must_use]
    pub fn scale(&self) -> ScaleFactor {
        self.scale
    }

    /// Returns the sharpening strength.
    #[must_use]
    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// Runs both stages. Pure function of the input and settings.
    #[must_use]
    pub fn enhance(&self, image: &PixelBuffer) -> PixelBuffer {
        let upscaled = bicubic_upscale(image, self.scale);
        unsharp_mask(&upscaled, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut image = PixelBuffer::filled(width, height, [0, 0, 0, 255]);
        for y in 0..height {
            for x in 0..width {
                #[allow(clippy::cast_possible_truncation)] // Test data fits in u8
                let v = ((x * 37 + y * 11) % 256) as u8;
                image.set_pixel(x, y, [v, 255 - v, v / 2, 255]);
            }
        }
        image
    }

    #[test]
    fn cubic_kernel_reference_points() {
        assert!((cubic_weight(0.0) - 1.0).abs() < f32::EPSILON);
        assert!(cubic_weight(1.0).abs() < f32::EPSILON);
        assert!(cubic_weight(-1.0).abs() < f32::EPSILON);
        assert!(cubic_weight(2.0).abs() < f32::EPSILON);
        assert!(cubic_weight(3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn cubic_kernel_is_continuous_at_one() {
        let below = cubic_weight(1.0 - 1e-4);
        let above = cubic_weight(1.0 + 1e-4);
        assert!((below - above).abs() < 1e-3);
    }

    #[test]
    fn cubic_kernel_weights_sum_to_one() {
        for step in 0..10u8 {
            let d = f32::from(step) / 10.0;
            let sum: f32 = (-1i8..=2).map(|i| cubic_weight(f32::from(i) - d)).sum();
            assert!((sum - 1.0).abs() < 1e-5, "sum {sum} at offset {d}");
        }
    }

    #[test]
    fn bicubic_scale_one_is_identity() {
        let input = gradient(7, 5);
        let output = bicubic_upscale(&input, ScaleFactor::new(1));
        assert_eq!(output, input);
    }

    #[test]
    fn bicubic_output_dimensions_follow_scale() {
        let input = gradient(5, 3);
        let output = bicubic_upscale(&input, ScaleFactor::new(3));
        assert_eq!(output.dimensions(), (15, 9));
    }

    #[test]
    fn bicubic_preserves_source_samples_on_grid() {
        let input = gradient(6, 4);
        let output = bicubic_upscale(&input, ScaleFactor::new(2));
        for y in 0..4 {
            for x in 0..6 {
                assert_eq!(output.pixel(x * 2, y * 2), input.pixel(x, y));
            }
        }
    }

    #[test]
    fn unsharp_mask_is_identity_on_flat_image() {
        let input = PixelBuffer::filled(9, 9, [120, 64, 200, 255]);
        let output = unsharp_mask(&input, DEFAULT_SHARPEN_AMOUNT);
        assert_eq!(output, input);
    }

    #[test]
    fn unsharp_mask_preserves_alpha() {
        let mut input = gradient(6, 6);
        input.set_pixel(2, 2, [10, 10, 10, 17]);
        let output = unsharp_mask(&input, 2.0);
        assert_eq!(output.pixel(2, 2)[3], 17);
    }

    #[test]
    fn unsharp_mask_increases_edge_contrast() {
        let mut input = PixelBuffer::filled(8, 1, [100, 100, 100, 255]);
        for x in 4..8 {
            input.set_pixel(x, 0, [150, 150, 150, 255]);
        }
        let output = unsharp_mask(&input, 1.5);
        assert!(output.pixel(3, 0)[0] < 100);
        assert!(output.pixel(4, 0)[0] > 150);
    }

    #[test]
    fn box_blur_on_flat_image_is_flat() {
        let input = PixelBuffer::filled(4, 4, [33, 66, 99, 255]);
        let blurred = box_blur_rgb(&input, BLUR_PASSES);
        for rgb in blurred.chunks_exact(3) {
            assert_eq!(rgb, &[33.0, 66.0, 99.0]);
        }
    }

    #[test]
    fn enhancer_clamps_amount() {
        let enhancer = ClassicalEnhancer::new(ScaleFactor::new(2), 50.0);
        assert!((enhancer.amount() - MAX_SHARPEN_AMOUNT).abs() < f32::EPSILON);
        let enhancer = ClassicalEnhancer::new(ScaleFactor::new(2), f32::NAN);
        assert!((enhancer.amount() - DEFAULT_SHARPEN_AMOUNT).abs() < f32::EPSILON);
    }

    #[test]
    fn enhancer_is_deterministic() {
        let input = gradient(10, 10);
        let enhancer = ClassicalEnhancer::default();
        assert_eq!(enhancer.enhance(&input), enhancer.enhance(&input));
    }
}
