// SPDX-License-Identifier: MPL-2.0
//! Domain layer - Core pixel and job types with ZERO external dependencies.
//!
//! This module contains pure domain types, value objects, and business rules.
//! It has no dependencies on external crates (except `std`) to ensure
//! testability and architectural purity.
//!
//! # Modules
//!
//! - [`error`]: Domain error types ([`ShapeError`](error::ShapeError))
//! - [`media`]: Pixel data ([`PixelBuffer`](media::PixelBuffer), [`Mask`](media::Mask))
//! - [`processing`]: Job and tier types ([`Tool`](processing::Tool),
//!   [`TierKind`](processing::TierKind), [`ModelId`](processing::ModelId),
//!   [`ProgressPercent`](processing::ProgressPercent), [`ScaleFactor`](processing::ScaleFactor))

pub mod error;
pub mod media;
pub mod processing;
