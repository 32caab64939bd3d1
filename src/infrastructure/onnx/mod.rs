// SPDX-License-Identifier: MPL-2.0
//! ONNX Runtime adapters implementing the AI port traits.
//!
//! - [`OnnxModelProvider`]: resolves a tier to its configured model file and
//!   commits an `ort` session on a blocking thread
//! - [`OnnxTierModel`]: runs one session and converts its output tensor to a
//!   [`TierOutput`](crate::application::port::TierOutput)
//!
//! # Design Notes
//!
//! - Tensor layout is NCHW `f32` throughout
//! - The execution backend is picked once per provider

mod model;
mod provider;
mod tensor;

pub use model::OnnxTierModel;
pub use provider::OnnxModelProvider;
