// SPDX-License-Identifier: MPL-2.0
//! Mask application and luminance color transfer.

use crate::domain::media::{Mask, PixelBuffer, CHANNELS};
use crate::media::enhance::to_channel;

/// Rec. 601 luminance of an RGB triple, in `0.0..=255.0`.
#[inline]
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

/// Resamples a mask with bilinear interpolation.
///
/// Sample positions use pixel centers, so a mask resized to its own
/// dimensions is returned unchanged.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn resize_mask(mask: &Mask, width: u32, height: u32) -> Mask {
    if mask.dimensions() == (width, height) {
        return mask.clone();
    }

    let (src_w, src_h) = mask.dimensions();
    let scale_x = src_w as f32 / width as f32;
    let scale_y = src_h as f32 / height as f32;
    let max_x = (src_w - 1) as f32;
    let max_y = (src_h - 1) as f32;

    let mut values = Vec::with_capacity((width as usize) * (height as usize));
    for y in 0..height {
        let sy = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, max_y);
        let y0 = sy.floor() as u32;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = sy - y0 as f32;
        for x in 0..width {
            let sx = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, max_x);
            let x0 = sx.floor() as u32;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = sx - x0 as f32;

            let top = mask.value(x0, y0) * (1.0 - fx) + mask.value(x1, y0) * fx;
            let bottom = mask.value(x0, y1) * (1.0 - fx) + mask.value(x1, y1) * fx;
            values.push(top * (1.0 - fy) + bottom * fy);
        }
    }

    Mask::new(width, height, values)
}

/// Binarizes a mask: weights at or above `threshold` become 1, others 0.
#[must_use]
pub fn threshold_mask(mask: &Mask, threshold: f32) -> Mask {
    let values = mask
        .values()
        .iter()
        .map(|&v| if v >= threshold { 1.0 } else { 0.0 })
        .collect();
    Mask::new(mask.width(), mask.height(), values)
}

/// Writes `round(mask * 255)` into the alpha channel, resizing the mask first
/// if needed. RGB is copied unchanged.
#[must_use]
pub fn apply_mask(image: &PixelBuffer, mask: &Mask) -> PixelBuffer {
    let resized = resize_mask(mask, image.width(), image.height());
    let mut out = image.clone();
    for (px, weight) in out
        .rgba_bytes_mut()
        .chunks_exact_mut(CHANNELS)
        .zip(resized.values())
    {
        px[3] = to_channel(weight.clamp(0.0, 1.0) * 255.0);
    }
    out
}

/// Recovers color for a luminance-only model output.
///
/// `luma` holds normalized luminance at the output resolution. Each output
/// pixel scales the nearest original pixel's RGB by `L_dst / L_src` (1 when
/// the original is black). Alpha is taken from the original.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn color_transfer(original: &PixelBuffer, luma: &Mask) -> PixelBuffer {
    let (src_w, src_h) = original.dimensions();
    let (dst_w, dst_h) = luma.dimensions();
    let mut out = Vec::with_capacity((dst_w as usize) * (dst_h as usize) * CHANNELS);

    for y in 0..dst_h {
        let sy = ((u64::from(y) * u64::from(src_h)) / u64::from(dst_h)) as u32;
        for x in 0..dst_w {
            let sx = ((u64::from(x) * u64::from(src_w)) / u64::from(dst_w)) as u32;
            let [r, g, b, a] = original.pixel(sx, sy);
            let l_src = luminance(r, g, b);
            let l_dst = luma.value(x, y) * 255.0;
            let ratio = if l_src > 0.0 { l_dst / l_src } else { 1.0 };

            out.push(to_channel(f32::from(r) * ratio));
            out.push(to_channel(f32::from(g) * ratio));
            out.push(to_channel(f32::from(b) * ratio));
            out.push(a);
        }
    }

    PixelBuffer::new(dst_w, dst_h, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_of_white_is_full_scale() {
        assert!((luminance(255, 255, 255) - 255.0).abs() < 0.01);
        assert!(luminance(0, 0, 0).abs() < f32::EPSILON);
    }

    #[test]
    fn resize_to_same_size_is_identity() {
        let mask = Mask::new(2, 2, vec![0.0, 0.25, 0.5, 1.0]);
        assert_eq!(resize_mask(&mask, 2, 2), mask);
    }

    #[test]
    fn resize_interpolates_between_samples() {
        let mask = Mask::new(2, 1, vec![0.0, 1.0]);
        let resized = resize_mask(&mask, 4, 1);
        let values = resized.values();
        assert!(values[0].abs() < 1e-6);
        assert!((values[1] - 0.25).abs() < 1e-6);
        assert!((values[2] - 0.75).abs() < 1e-6);
        assert!((values[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn apply_mask_sets_alpha_and_keeps_rgb() {
        let image = PixelBuffer::filled(2, 1, [10, 20, 30, 255]);
        let mask = Mask::new(2, 1, vec![0.0, 0.5]);
        let out = apply_mask(&image, &mask);
        assert_eq!(out.pixel(0, 0), [10, 20, 30, 0]);
        assert_eq!(out.pixel(1, 0), [10, 20, 30, 128]);
    }

    #[test]
    fn apply_mask_resizes_smaller_mask() {
        let image = PixelBuffer::filled(8, 8, [1, 1, 1, 1]);
        let mask = Mask::new(2, 2, vec![1.0; 4]);
        let out = apply_mask(&image, &mask);
        assert!(out.alpha().all(|a| a == 255));
    }

    #[test]
    fn threshold_splits_at_boundary() {
        let mask = Mask::new(3, 1, vec![0.49, 0.5, 0.9]);
        assert_eq!(threshold_mask(&mask, 0.5).values(), &[0.0, 1.0, 1.0]);
    }

    #[test]
    fn color_transfer_scales_by_luminance_ratio() {
        let original = PixelBuffer::filled(1, 1, [100, 100, 100, 200]);
        // Double the luminance
        let luma = Mask::new(2, 2, vec![200.0 / 255.0; 4]);
        let out = color_transfer(&original, &luma);
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(out.pixel(1, 1), [200, 200, 200, 200]);
    }

    #[test]
    fn color_transfer_keeps_black_pixels() {
        let original = PixelBuffer::filled(1, 1, [0, 0, 0, 255]);
        let luma = Mask::new(1, 1, vec![1.0]);
        assert_eq!(color_transfer(&original, &luma).pixel(0, 0), [0, 0, 0, 255]);
    }
}
