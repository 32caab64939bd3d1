// SPDX-License-Identifier: MPL-2.0
//! Pixel data types.

mod types;

pub use types::{Mask, PixelBuffer, CHANNELS};
