// SPDX-License-Identifier: MPL-2.0
//! Core pixel types for the domain layer.
//!
//! These types represent pure data without any codec or model dependencies.

use crate::domain::error::ShapeError;

/// Number of interleaved channels in a [`PixelBuffer`] (R, G, B, A).
pub const CHANNELS: usize = 4;

/// Owned RGBA image data.
///
/// The buffer length always equals `width * height * 4`; every constructor
/// enforces it, and no method can change the length afterwards.
///
/// # Example
///
/// ```
/// use lens_refine::domain::media::PixelBuffer;
///
/// let pixels = vec![255u8; 100 * 100 * 4]; // 100x100 RGBA
/// let image = PixelBuffer::new(100, 100, pixels);
///
/// assert_eq!(image.width(), 100);
/// assert_eq!(image.height(), 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Image width in pixels.
    width: u32,
    /// Image height in pixels.
    height: u32,
    /// RGBA pixel data (4 bytes per pixel).
    rgba_bytes: Vec<u8>,
}

impl PixelBuffer {
    /// Creates a new `PixelBuffer` from dimensions and RGBA pixel data.
    ///
    /// # Panics
    ///
    /// Panics if a dimension is zero or the pixel data length doesn't match
    /// `width * height * 4`.
    #[must_use]
    pub fn new(width: u32, height: u32, rgba_bytes: Vec<u8>) -> Self {
        match Self::try_new(width, height, rgba_bytes) {
            Ok(buffer) => buffer,
            Err(err) => panic!("Invalid RGBA buffer: {err}"),
        }
    }

    /// Creates a new `PixelBuffer`, validating the shape.
    ///
    /// # Errors
    ///
    /// Returns a [`ShapeError`] if a dimension is zero or the data length
    /// doesn't match `width * height * 4`.
    pub fn try_new(width: u32, height: u32, rgba_bytes: Vec<u8>) -> Result<Self, ShapeError> {
        if width == 0 || height == 0 {
            return Err(ShapeError::ZeroDimension { width, height });
        }
        let expected = (width as usize) * (height as usize) * CHANNELS;
        if rgba_bytes.len() != expected {
            return Err(ShapeError::LengthMismatch {
                expected,
                actual: rgba_bytes.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba_bytes,
        })
    }

    /// Creates a buffer where every pixel has the same RGBA value.
    ///
    /// # Panics
    ///
    /// Panics if a dimension is zero.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            data.extend_from_slice(&rgba);
        }
        Self::new(width, height, data)
    }

    /// Returns the image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns a reference to the RGBA pixel data.
    #[must_use]
    pub fn rgba_bytes(&self) -> &[u8] {
        &self.rgba_bytes
    }

    /// Returns the RGBA pixel data for in-place edits.
    ///
    /// The slice cannot be resized, so the length invariant holds.
    pub fn rgba_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.rgba_bytes
    }

    /// Consumes the buffer and returns the raw RGBA bytes.
    #[must_use]
    pub fn into_rgba_bytes(self) -> Vec<u8> {
        self.rgba_bytes
    }

    /// Returns the total number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Byte offset of the pixel at `(x, y)`.
    #[inline]
    #[must_use]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * CHANNELS
    }

    /// Returns the RGBA value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.rgba_bytes[i],
            self.rgba_bytes[i + 1],
            self.rgba_bytes[i + 2],
            self.rgba_bytes[i + 3],
        ]
    }

    /// Overwrites the RGBA value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.rgba_bytes[i..i + CHANNELS].copy_from_slice(&rgba);
    }

    /// Iterates over the alpha channel.
    pub fn alpha(&self) -> impl Iterator<Item = u8> + '_ {
        self.rgba_bytes.chunks_exact(CHANNELS).map(|px| px[3])
    }
}

/// Single-channel weights in `[0, 1]`, typically produced by a segmentation
/// model or derived from a classification pass.
///
/// A mask may have different dimensions than the image it is applied to;
/// callers resample it first (see `media::composite::resize_mask`).
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl Mask {
    /// Creates a new mask from normalized weights.
    ///
    /// # Panics
    ///
    /// Panics if a dimension is zero or the length doesn't match `width * height`.
    #[must_use]
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Self {
        match Self::try_new(width, height, values) {
            Ok(mask) => mask,
            Err(err) => panic!("Invalid mask: {err}"),
        }
    }

    /// Creates a new mask, validating the shape.
    ///
    /// # Errors
    ///
    /// Returns a [`ShapeError`] if a dimension is zero or the length doesn't
    /// match `width * height`.
    pub fn try_new(width: u32, height: u32, values: Vec<f32>) -> Result<Self, ShapeError> {
        if width == 0 || height == 0 {
            return Err(ShapeError::ZeroDimension { width, height });
        }
        let expected = (width as usize) * (height as usize);
        if values.len() != expected {
            return Err(ShapeError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Creates a mask from byte weights (`0` → 0.0, `255` → 1.0).
    ///
    /// # Errors
    ///
    /// Returns a [`ShapeError`] for invalid shapes.
    pub fn from_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, ShapeError> {
        let values = bytes.iter().map(|&b| f32::from(b) / 255.0).collect();
        Self::try_new(width, height, values)
    }

    /// Creates a mask from the alpha channel of an image.
    #[must_use]
    pub fn from_alpha(image: &PixelBuffer) -> Self {
        let values = image.alpha().map(|a| f32::from(a) / 255.0).collect();
        Self {
            width: image.width(),
            height: image.height(),
            values,
        }
    }

    /// Returns the mask width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the mask height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the weights in row-major order.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns the weight at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.values[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Returns `true` if every weight is finite and inside `[0, 1]`.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.values
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }

    /// Returns a mask where each weight is `1 - w`.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            values: self.values.iter().map(|v| 1.0 - v).collect(),
        }
    }
}
