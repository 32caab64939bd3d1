// SPDX-License-Identifier: MPL-2.0
//! Infrastructure layer adapters.
//!
//! This module contains concrete implementations of the port traits defined in
//! `application::port`. These adapters wrap external dependencies like
//! ONNX Runtime and the model download server.
//!
//! # Available Adapters
//!
//! - [`onnx`]: Learned tiers via ONNX Runtime (implements [`ModelProvider`])
//!
//! [`ModelProvider`]: crate::application::port::ModelProvider

pub mod onnx;

// Re-export main types for convenience
pub use onnx::{OnnxModelProvider, OnnxTierModel};
