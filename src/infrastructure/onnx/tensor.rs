// SPDX-License-Identifier: MPL-2.0
//! Conversions between pixel buffers and NCHW `f32` tensors.

use crate::application::port::AIError;
use crate::config::Normalization;
use crate::domain::media::{Mask, PixelBuffer};
use crate::media::composite::luminance;
use crate::media::enhance::to_channel;
use image_rs::imageops::{self, FilterType};
use image_rs::RgbaImage;
use ndarray::Array4;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Builds a `[1, 3, H, W]` tensor from the RGB channels.
pub(crate) fn rgb_tensor(image: &PixelBuffer, normalization: Normalization) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for y in 0..height {
        for x in 0..width {
            let pixel = image.pixel(x, y);
            for c in 0..3 {
                let unit = f32::from(pixel[c]) / 255.0;
                tensor[[0, c, y as usize, x as usize]] = match normalization {
                    Normalization::Unit => unit,
                    Normalization::Imagenet => (unit - IMAGENET_MEAN[c]) / IMAGENET_STD[c],
                };
            }
        }
    }

    tensor
}

/// Builds a `[1, 1, H, W]` luminance tensor in `[0, 1]`.
pub(crate) fn luma_tensor(image: &PixelBuffer) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 1, height as usize, width as usize));

    for y in 0..height {
        for x in 0..width {
            let [r, g, b, _] = image.pixel(x, y);
            tensor[[0, 0, y as usize, x as usize]] = luminance(r, g, b) / 255.0;
        }
    }

    tensor
}

/// Resizes an image with a bilinear filter.
pub(crate) fn resize_rgba(image: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer, AIError> {
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }
    let source = RgbaImage::from_raw(image.width(), image.height(), image.rgba_bytes().to_vec())
        .ok_or_else(|| AIError::InferenceFailed("invalid RGBA buffer".to_string()))?;
    let resized = imageops::resize(&source, width, height, FilterType::Triangle);
    PixelBuffer::try_new(width, height, resized.into_raw())
        .map_err(|e| AIError::InferenceFailed(e.to_string()))
}

/// Spatial layout of an output tensor: `(planes, height, width)`.
///
/// The last two axes are height and width; every leading axis is folded
/// into the plane count.
fn planes_of(shape: &[i64], data_len: usize) -> Result<(usize, u32, u32), AIError> {
    if !(2..=4).contains(&shape.len()) {
        return Err(AIError::MalformedOutput(format!(
            "expected 2D to 4D tensor, got {}D",
            shape.len()
        )));
    }

    let dims: Vec<usize> = shape
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<Result<_, _>>()
        .map_err(|_| AIError::MalformedOutput("negative tensor dimension".to_string()))?;

    let height = dims[dims.len() - 2];
    let width = dims[dims.len() - 1];
    let planes: usize = dims[..dims.len() - 2].iter().product();

    if height == 0 || width == 0 || planes == 0 {
        return Err(AIError::MalformedOutput("empty output tensor".to_string()));
    }
    if data_len < planes * height * width {
        return Err(AIError::MalformedOutput(format!(
            "tensor data holds {data_len} values, shape needs {}",
            planes * height * width
        )));
    }

    let height = u32::try_from(height)
        .map_err(|_| AIError::MalformedOutput("tensor height too large".to_string()))?;
    let width = u32::try_from(width)
        .map_err(|_| AIError::MalformedOutput("tensor width too large".to_string()))?;
    Ok((planes, height, width))
}

/// Reads an NCHW RGB output in `[0, 1]` into an opaque image.
pub(crate) fn image_from_tensor(shape: &[i64], data: &[f32]) -> Result<PixelBuffer, AIError> {
    let (planes, height, width) = planes_of(shape, data.len())?;
    if planes < 3 {
        return Err(AIError::MalformedOutput(format!(
            "expected 3 channels, got {planes}"
        )));
    }

    let channel_size = (height as usize) * (width as usize);
    let mut pixels = Vec::with_capacity(channel_size * 4);
    for idx in 0..channel_size {
        for c in 0..3 {
            let value = data[c * channel_size + idx];
            if !value.is_finite() {
                return Err(AIError::MalformedOutput("non-finite pixel value".to_string()));
            }
            pixels.push(to_channel(value.clamp(0.0, 1.0) * 255.0));
        }
        pixels.push(u8::MAX);
    }

    PixelBuffer::try_new(width, height, pixels).map_err(|e| AIError::MalformedOutput(e.to_string()))
}

/// Reads the first plane of an output tensor.
pub(crate) fn plane_from_tensor(shape: &[i64], data: &[f32]) -> Result<Mask, AIError> {
    let (_, height, width) = planes_of(shape, data.len())?;
    let len = (height as usize) * (width as usize);
    Mask::try_new(width, height, data[..len].to_vec())
        .map_err(|e| AIError::MalformedOutput(e.to_string()))
}

/// Clamps finite values into `[0, 1]`. Non-finite values are kept so
/// validation still rejects them.
pub(crate) fn clamp_plane(plane: &Mask) -> Mask {
    let values = plane
        .values()
        .iter()
        .map(|&v| if v.is_finite() { v.clamp(0.0, 1.0) } else { v })
        .collect();
    Mask::new(plane.width(), plane.height(), values)
}

/// Replaces the alpha of `image` with `source` alpha, sampled nearest-neighbor.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn with_alpha_from(mut image: PixelBuffer, source: &PixelBuffer) -> PixelBuffer {
    let (width, height) = image.dimensions();
    let (src_w, src_h) = source.dimensions();
    for y in 0..height {
        let sy = ((u64::from(y) * u64::from(src_h)) / u64::from(height)) as u32;
        for x in 0..width {
            let sx = ((u64::from(x) * u64::from(src_w)) / u64::from(width)) as u32;
            let mut pixel = image.pixel(x, y);
            pixel[3] = source.pixel(sx, sy)[3];
            image.set_pixel(x, y, pixel);
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_tensor_has_nchw_shape() {
        let image = PixelBuffer::filled(5, 3, [255, 0, 51, 255]);
        let tensor = rgb_tensor(&image, Normalization::Unit);
        assert_eq!(tensor.shape(), &[1, 3, 3, 5]);
        assert!((tensor[[0, 0, 2, 4]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 0, 0]].abs() < 1e-6);
        assert!((tensor[[0, 2, 1, 1]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn imagenet_normalization_centers_values() {
        let image = PixelBuffer::filled(1, 1, [0, 0, 0, 255]);
        let tensor = rgb_tensor(&image, Normalization::Imagenet);
        let expected = -IMAGENET_MEAN[0] / IMAGENET_STD[0];
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-5);
    }

    #[test]
    fn luma_tensor_uses_rec601_weights() {
        let image = PixelBuffer::filled(2, 2, [255, 255, 255, 255]);
        let tensor = luma_tensor(&image);
        assert_eq!(tensor.shape(), &[1, 1, 2, 2]);
        assert!((tensor[[0, 0, 1, 1]] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn image_from_tensor_reads_planar_channels() {
        // 1x2 image: pixel 0 red, pixel 1 blue
        let data = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let image = image_from_tensor(&[1, 3, 1, 2], &data).unwrap();
        assert_eq!(image.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(image.pixel(1, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn image_from_tensor_clamps_out_of_range() {
        let data = [1.5, -0.5, 0.5];
        let image = image_from_tensor(&[1, 3, 1, 1], &data).unwrap();
        assert_eq!(image.pixel(0, 0), [255, 0, 128, 255]);
    }

    #[test]
    fn image_from_tensor_rejects_bad_shapes() {
        assert!(image_from_tensor(&[1, 1, 2, 2], &[0.0; 4]).is_err());
        assert!(image_from_tensor(&[1, 3, 2, 2], &[0.0; 5]).is_err());
        assert!(image_from_tensor(&[12], &[0.0; 12]).is_err());
        assert!(image_from_tensor(&[1, 3, 0, 2], &[]).is_err());
    }

    #[test]
    fn plane_from_tensor_accepts_2d_to_4d() {
        let data = [0.1, 0.2, 0.3, 0.4];
        for shape in [&[2, 2][..], &[1, 2, 2], &[1, 1, 2, 2]] {
            let plane = plane_from_tensor(shape, &data).unwrap();
            assert_eq!(plane.dimensions(), (2, 2));
            assert!((plane.value(1, 1) - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn clamp_plane_keeps_nan() {
        let plane = Mask::new(3, 1, vec![-0.2, 1.3, f32::NAN]);
        let clamped = clamp_plane(&plane);
        assert_eq!(clamped.values()[0], 0.0);
        assert_eq!(clamped.values()[1], 1.0);
        assert!(clamped.values()[2].is_nan());
    }

    #[test]
    fn resize_rgba_changes_dimensions() {
        let image = PixelBuffer::filled(4, 2, [10, 20, 30, 255]);
        let resized = resize_rgba(&image, 8, 8).unwrap();
        assert_eq!(resized.dimensions(), (8, 8));
        assert_eq!(resized.pixel(7, 7), [10, 20, 30, 255]);
    }

    #[test]
    fn alpha_is_carried_over_at_scale() {
        let mut source = PixelBuffer::filled(2, 1, [0, 0, 0, 255]);
        source.set_pixel(1, 0, [0, 0, 0, 0]);
        let output = PixelBuffer::filled(4, 2, [9, 9, 9, 255]);
        let merged = with_alpha_from(output, &source);
        assert_eq!(merged.pixel(1, 1)[3], 255);
        assert_eq!(merged.pixel(2, 0)[3], 0);
        assert_eq!(merged.pixel(3, 1), [9, 9, 9, 0]);
    }
}
