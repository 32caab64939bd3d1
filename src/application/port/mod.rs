// SPDX-License-Identifier: MPL-2.0
//! Port definitions (traits) for dependency inversion.
//!
//! This module defines abstract interfaces that infrastructure adapters implement.
//! These traits use only domain types, ensuring the application layer remains
//! independent of the inference runtime.
//!
//! # Available Ports
//!
//! - [`ai`]: Learned-model loading and inference
//!
//! # Example
//!
//! ```ignore
//! use lens_refine::application::port::{ModelProvider, TierModel};
//! use lens_refine::domain::processing::{ModelId, NeuralTier, Tool};
//!
//! async fn warm(provider: &dyn ModelProvider) {
//!     let id = ModelId::new(Tool::Enhance, NeuralTier::Primary);
//!     if let Ok(model) = provider.load(id).await {
//!         println!("{}", model.capabilities().name);
//!     }
//! }
//! ```

pub mod ai;

// Re-export main types for convenience
pub use ai::{
    AIError, Backend, ModelHandle, ModelProvider, ProcessorCapabilities, TierModel, TierOutput,
};
