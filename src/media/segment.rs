// SPDX-License-Identifier: MPL-2.0
//! Deterministic background removal.
//!
//! The classical segmenter treats the most frequent colors of an image as
//! background candidates. Every pixel close to one of them becomes
//! transparent, every other pixel stays opaque. A morphological opening
//! (erosion then dilation) on the alpha channel removes isolated
//! misclassified pixels.
//!
//! Learned segmentation tiers reuse the cleanup through [`segment_with_mask`].

use std::collections::HashMap;

use crate::config::defaults::{
    DEFAULT_BACKGROUND_DISTANCE, DEFAULT_BUCKET_WIDTH, DEFAULT_DOMINANT_COLORS,
};
use crate::domain::media::{Mask, PixelBuffer, CHANNELS};
use crate::media::composite::{apply_mask, resize_mask, threshold_mask};

/// A quantized RGB color.
pub type Rgb = [u8; 3];

/// Quantizes a channel to the lower edge of its bucket.
#[inline]
#[must_use]
pub fn quantize(channel: u8, bucket_width: u8) -> u8 {
    let width = bucket_width.max(1);
    (channel / width) * width
}

/// Counts quantized RGB colors. Alpha is ignored.
#[must_use]
pub fn build_histogram(image: &PixelBuffer, bucket_width: u8) -> HashMap<Rgb, u32> {
    let mut histogram: HashMap<Rgb, u32> = HashMap::new();
    for px in image.rgba_bytes().chunks_exact(CHANNELS) {
        let key = [
            quantize(px[0], bucket_width),
            quantize(px[1], bucket_width),
            quantize(px[2], bucket_width),
        ];
        *histogram.entry(key).or_insert(0) += 1;
    }
    histogram
}

/// Returns the `k` most frequent colors.
///
/// Ties are broken by ascending color value so the result does not depend on
/// hash iteration order.
#[must_use]
pub fn dominant_colors(histogram: &HashMap<Rgb, u32>, k: usize) -> Vec<Rgb> {
    let mut entries: Vec<(Rgb, u32)> = histogram.iter().map(|(c, n)| (*c, *n)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.into_iter().take(k).map(|(color, _)| color).collect()
}

#[inline]
fn distance(px: &[u8], color: Rgb) -> f32 {
    let dr = f32::from(px[0]) - f32::from(color[0]);
    let dg = f32::from(px[1]) - f32::from(color[1]);
    let db = f32::from(px[2]) - f32::from(color[2]);
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Sets alpha to 0 for pixels within `max_distance` of any candidate and to
/// 255 otherwise. RGB is preserved.
#[must_use]
pub fn classify(image: &PixelBuffer, candidates: &[Rgb], max_distance: f32) -> PixelBuffer {
    let mut out = image.clone();
    for px in out.rgba_bytes_mut().chunks_exact_mut(CHANNELS) {
        let background = candidates.iter().any(|c| distance(px, *c) < max_distance);
        px[3] = if background { 0 } else { 255 };
    }
    out
}

fn morph_plane(plane: &[u8], width: usize, height: usize, pick: fn(u8, u8) -> u8) -> Vec<u8> {
    let mut out = plane.to_vec();
    if width < 3 || height < 3 {
        return out;
    }
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = plane[y * width + x];
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    acc = pick(acc, plane[ny * width + nx]);
                }
            }
            out[y * width + x] = acc;
        }
    }
    out
}

/// 3x3 minimum filter. Border values are left unchanged.
#[must_use]
pub fn erode(plane: &[u8], width: usize, height: usize) -> Vec<u8> {
    morph_plane(plane, width, height, u8::min)
}

/// 3x3 maximum filter. Border values are left unchanged.
#[must_use]
pub fn dilate(plane: &[u8], width: usize, height: usize) -> Vec<u8> {
    morph_plane(plane, width, height, u8::max)
}

/// Erodes then dilates the alpha channel of an image.
#[must_use]
pub fn morphological_cleanup(image: &PixelBuffer) -> PixelBuffer {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let alpha: Vec<u8> = image.alpha().collect();
    let cleaned = dilate(&erode(&alpha, width, height), width, height);

    let mut out = image.clone();
    for (px, a) in out.rgba_bytes_mut().chunks_exact_mut(CHANNELS).zip(cleaned) {
        px[3] = a;
    }
    out
}

/// Segments an image with a learned foreground-confidence mask.
///
/// The mask is resampled to the image, binarized at `threshold` (values
/// below it are background), applied as alpha and cleaned up the same way
/// as the classical path.
#[must_use]
pub fn segment_with_mask(image: &PixelBuffer, mask: &Mask, threshold: f32) -> PixelBuffer {
    let resized = resize_mask(mask, image.width(), image.height());
    let binary = threshold_mask(&resized, threshold);
    morphological_cleanup(&apply_mask(image, &binary))
}

/// Classical segmentation tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassicalSegmenter {
    background_distance: f32,
    dominant_colors: usize,
    bucket_width: u8,
}

impl Default for ClassicalSegmenter {
    fn default() -> Self {
        Self {
            background_distance: DEFAULT_BACKGROUND_DISTANCE,
            dominant_colors: DEFAULT_DOMINANT_COLORS,
            bucket_width: DEFAULT_BUCKET_WIDTH,
        }
    }
}

impl ClassicalSegmenter {
    /// Creates a segmenter with explicit tunables.
    ///
    /// A zero bucket width is treated as 1.
    #[must_use]
    pub fn new(background_distance: f32, dominant_colors: usize, bucket_width: u8) -> Self {
        Self {
            background_distance,
            dominant_colors,
            bucket_width: bucket_width.max(1),
        }
    }

    /// Background distance threshold.
    #[must_use]
    pub fn background_distance(&self) -> f32 {
        self.background_distance
    }

    /// Number of background candidates.
    #[must_use]
    pub fn dominant_colors(&self) -> usize {
        self.dominant_colors
    }

    /// Runs histogram, classification and cleanup.
    #[must_use]
    pub fn segment(&self, image: &PixelBuffer) -> PixelBuffer {
        let histogram = build_histogram(image, self.bucket_width);
        let candidates = dominant_colors(&histogram, self.dominant_colors);
        tracing::debug!(?candidates, "background candidates");
        morphological_cleanup(&classify(image, &candidates, self.background_distance))
    }
}
