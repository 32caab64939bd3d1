// SPDX-License-Identifier: MPL-2.0
//! Conversion between encoded image files and [`PixelBuffer`]s.

use std::io::Cursor;
use std::path::Path;

use image_rs::{ImageFormat, RgbaImage};

use crate::domain::media::PixelBuffer;
use crate::error::{Error, Result};

/// Decodes an encoded image (PNG, JPEG, WebP, ...) into RGBA pixels.
///
/// # Errors
///
/// - Empty input ([`Error::InvalidInput`])
/// - Unknown or corrupt format ([`Error::Decode`])
/// - Zero-dimension image ([`Error::InvalidInput`])
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer> {
    if bytes.is_empty() {
        return Err(Error::InvalidInput("Input file is empty".into()));
    }
    let rgba = image_rs::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(PixelBuffer::try_new(width, height, rgba.into_raw())?)
}

/// Encodes a buffer as PNG bytes.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the encoder fails.
pub fn encode_png(image: &PixelBuffer) -> Result<Vec<u8>> {
    let rgba = to_rgba_image(image)?;
    let mut bytes = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Writes a buffer to disk. The format follows the file extension.
///
/// # Errors
///
/// Returns an error if the extension is unsupported or writing fails.
pub fn save_image<P: AsRef<Path>>(image: &PixelBuffer, path: P) -> Result<()> {
    to_rgba_image(image)?.save(path.as_ref())?;
    Ok(())
}

fn to_rgba_image(image: &PixelBuffer) -> Result<RgbaImage> {
    RgbaImage::from_raw(image.width(), image.height(), image.rgba_bytes().to_vec())
        .ok_or_else(|| Error::InvalidInput("RGBA buffer does not match dimensions".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_input_is_invalid() {
        assert!(matches!(decode_image(&[]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn garbage_input_fails_to_decode() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn png_encoding_preserves_pixels() {
        let mut image = PixelBuffer::filled(3, 2, [1, 2, 3, 255]);
        image.set_pixel(1, 1, [200, 100, 50, 0]);

        let bytes = encode_png(&image).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn save_image_writes_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("out.png");
        save_image(&PixelBuffer::filled(4, 4, [0, 0, 0, 255]), &path).unwrap();

        let decoded = decode_image(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
    }
}
