// SPDX-License-Identifier: MPL-2.0
//! AI processing port definition.
//!
//! This module defines the [`TierModel`] trait implemented by learned tiers
//! and the [`ModelProvider`] trait the model cache loads them through.
//!
//! # Design Notes
//!
//! - Model downloading and session creation are provider-specific
//! - Loading is asynchronous, inference is synchronous
//! - Both traits are `Send + Sync` so handles can be shared between waiters

use crate::domain::media::{Mask, PixelBuffer};
use crate::domain::processing::{ModelId, ScaleFactor, Tool};
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Tolerance for normalized outputs slightly outside `[0, 1]`.
pub const NORMALIZED_TOLERANCE: f32 = 1e-3;

// =============================================================================
// AIError
// =============================================================================

/// Errors that can occur during AI processing.
///
/// Every variant is a tier failure: the orchestrator advances to the next
/// tier instead of failing the job.
#[derive(Debug, Clone, PartialEq)]
pub enum AIError {
    /// No model is configured for this tier.
    ModelNotReady,

    /// The model file could not be fetched or loaded.
    ModelLoadFailed(String),

    /// Inference failed during processing.
    InferenceFailed(String),

    /// The model returned output of the wrong shape or range.
    MalformedOutput(String),

    /// The input image is too large for the model.
    InputTooLarge {
        /// Maximum supported dimensions.
        max: (u32, u32),
        /// Actual image dimensions.
        actual: (u32, u32),
    },

    /// Memory or device resources ran out.
    ResourceExhausted(String),

    /// The operation was cancelled.
    Cancelled,
}

impl fmt::Display for AIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AIError::ModelNotReady => write!(f, "AI model is not ready"),
            AIError::ModelLoadFailed(msg) => write!(f, "Failed to load model: {msg}"),
            AIError::InferenceFailed(msg) => write!(f, "Inference failed: {msg}"),
            AIError::MalformedOutput(msg) => write!(f, "Malformed model output: {msg}"),
            AIError::InputTooLarge { max, actual } => {
                write!(
                    f,
                    "Input too large: {}x{} (max: {}x{})",
                    actual.0, actual.1, max.0, max.1
                )
            }
            AIError::ResourceExhausted(msg) => write!(f, "Resources exhausted: {msg}"),
            AIError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl std::error::Error for AIError {}

impl From<crate::media::model_store::ModelStoreError> for AIError {
    fn from(err: crate::media::model_store::ModelStoreError) -> Self {
        AIError::ModelLoadFailed(err.to_string())
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Execution backend reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// A GPU execution provider is in use.
    GpuAccelerated,
    /// Inference runs on the CPU.
    CpuFallback,
}

impl Backend {
    /// Wire name of the backend.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::GpuAccelerated => "gpu-accelerated",
            Backend::CpuFallback => "cpu-fallback",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ProcessorCapabilities
// =============================================================================

/// Describes the capabilities of a loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorCapabilities {
    /// Human-readable name of the model.
    pub name: String,

    /// Declared upscale factor of image or luminance outputs.
    /// `None` for models that keep or ignore the input size (masks).
    pub scale_factor: Option<ScaleFactor>,

    /// Maximum input dimensions supported by the model.
    /// `None` if there's no practical limit.
    pub input_size_limit: Option<(u32, u32)>,
}

impl ProcessorCapabilities {
    /// Creates capabilities for a model that doesn't scale.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scale_factor: None,
            input_size_limit: None,
        }
    }

    /// Creates capabilities for an upscaling model.
    #[must_use]
    pub fn upscaler(name: impl Into<String>, scale_factor: ScaleFactor) -> Self {
        Self {
            name: name.into(),
            scale_factor: Some(scale_factor),
            input_size_limit: None,
        }
    }

    /// Sets the input size limit.
    #[must_use]
    pub fn with_input_limit(mut self, max_width: u32, max_height: u32) -> Self {
        self.input_size_limit = Some((max_width, max_height));
        self
    }

    /// Returns `true` if this model is an upscaler.
    #[must_use]
    pub fn is_upscaler(&self) -> bool {
        self.scale_factor.is_some()
    }

    /// Checks if the given dimensions are within the input size limit.
    #[must_use]
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        match self.input_size_limit {
            Some((max_w, max_h)) => width <= max_w && height <= max_h,
            None => true,
        }
    }
}

// =============================================================================
// TierOutput
// =============================================================================

/// Raw result of a learned tier, before compositing.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutput {
    /// Finished RGBA image.
    Image(PixelBuffer),
    /// Normalized luminance at output resolution; needs color transfer.
    Luma(Mask),
    /// Foreground confidence at any resolution.
    Mask(Mask),
}

impl TierOutput {
    /// Returns `true` if the output can finish a job for `tool`.
    #[must_use]
    pub fn suits(&self, tool: Tool) -> bool {
        matches!(
            (tool, self),
            (Tool::Enhance, TierOutput::Image(_) | TierOutput::Luma(_))
                | (Tool::Segment, TierOutput::Image(_) | TierOutput::Mask(_))
        )
    }

    /// Checks shape and value range against the input and declared scale.
    ///
    /// # Errors
    ///
    /// Returns [`AIError::MalformedOutput`] when image or luminance dimensions
    /// differ from `input * scale`, or when normalized values are non-finite
    /// or outside `[0, 1]`.
    pub fn validate(
        &self,
        input_width: u32,
        input_height: u32,
        declared_scale: Option<ScaleFactor>,
    ) -> Result<(), AIError> {
        let expected = declared_scale.map(|s| s.apply_to_dimensions(input_width, input_height));

        match self {
            TierOutput::Image(image) => check_dimensions(image.dimensions(), expected),
            TierOutput::Luma(luma) => {
                check_dimensions(luma.dimensions(), expected)?;
                check_normalized(luma)
            }
            TierOutput::Mask(mask) => check_normalized(mask),
        }
    }
}

fn check_dimensions(actual: (u32, u32), expected: Option<(u32, u32)>) -> Result<(), AIError> {
    match expected {
        Some(expected) if expected != actual => Err(AIError::MalformedOutput(format!(
            "expected {}x{}, got {}x{}",
            expected.0, expected.1, actual.0, actual.1
        ))),
        _ => Ok(()),
    }
}

fn check_normalized(plane: &Mask) -> Result<(), AIError> {
    let range = -NORMALIZED_TOLERANCE..=1.0 + NORMALIZED_TOLERANCE;
    match plane
        .values()
        .iter()
        .find(|v| !v.is_finite() || !range.contains(*v))
    {
        Some(bad) => Err(AIError::MalformedOutput(format!(
            "value {bad} outside [0, 1]"
        ))),
        None => Ok(()),
    }
}

// =============================================================================
// TierModel / ModelProvider Traits
// =============================================================================

/// A loaded learned model.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one handle is shared by every
/// caller of the model cache.
pub trait TierModel: Send + Sync {
    /// Runs the model on an image.
    ///
    /// # Errors
    ///
    /// Returns an [`AIError`] if inference fails or the input is unsupported.
    fn infer(&self, image: &PixelBuffer) -> Result<TierOutput, AIError>;

    /// Returns the capabilities of this model.
    fn capabilities(&self) -> ProcessorCapabilities;

    /// Releases the underlying resources. Later calls to `infer` fail.
    fn release(&self) {}
}

/// Shared handle to a loaded model.
pub type ModelHandle = Arc<dyn TierModel>;

/// Source of model handles.
pub trait ModelProvider: Send + Sync {
    /// Loads the model for `id`. Each call performs a full load.
    fn load(&self, id: ModelId) -> BoxFuture<'static, Result<ModelHandle, AIError>>;

    /// Backend the loaded models run on.
    fn backend(&self) -> Backend;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_error_display() {
        let err = AIError::ModelNotReady;
        assert_eq!(format!("{err}"), "AI model is not ready");

        let err = AIError::InputTooLarge {
            max: (1024, 1024),
            actual: (2048, 2048),
        };
        let display = format!("{err}");
        assert!(display.contains("2048x2048"));
        assert!(display.contains("1024x1024"));
    }

    #[test]
    fn processor_capabilities_upscaler() {
        let caps = ProcessorCapabilities::upscaler("Real-ESRGAN x4", ScaleFactor::new(4))
            .with_input_limit(1024, 1024);

        assert!(caps.is_upscaler());
        assert!(caps.supports_size(512, 512));
        assert!(!caps.supports_size(2048, 2048));
        assert!(ProcessorCapabilities::new("mask").supports_size(10_000, 10_000));
    }

    #[test]
    fn backend_wire_names() {
        assert_eq!(Backend::GpuAccelerated.to_string(), "gpu-accelerated");
        assert_eq!(Backend::CpuFallback.as_str(), "cpu-fallback");
    }

    #[test]
    fn image_output_must_match_declared_scale() {
        let output = TierOutput::Image(PixelBuffer::filled(20, 10, [0, 0, 0, 255]));
        assert!(output.validate(10, 5, Some(ScaleFactor::new(2))).is_ok());
        assert!(matches!(
            output.validate(10, 5, Some(ScaleFactor::new(4))),
            Err(AIError::MalformedOutput(_))
        ));
        assert!(output.validate(3, 3, None).is_ok());
    }

    #[test]
    fn luma_output_rejects_nan() {
        let output = TierOutput::Luma(Mask::new(2, 1, vec![0.5, f32::NAN]));
        assert!(output.validate(2, 1, Some(ScaleFactor::new(1))).is_err());
    }

    #[test]
    fn mask_output_accepts_small_overshoot_only() {
        let ok = TierOutput::Mask(Mask::new(2, 1, vec![-0.0005, 1.0005]));
        assert!(ok.validate(100, 100, None).is_ok());

        let bad = TierOutput::Mask(Mask::new(2, 1, vec![0.2, 3.0]));
        assert!(bad.validate(100, 100, None).is_err());
    }

    #[test]
    fn output_kind_must_suit_tool() {
        let mask = TierOutput::Mask(Mask::new(1, 1, vec![1.0]));
        assert!(mask.suits(Tool::Segment));
        assert!(!mask.suits(Tool::Enhance));

        let luma = TierOutput::Luma(Mask::new(1, 1, vec![1.0]));
        assert!(luma.suits(Tool::Enhance));
        assert!(!luma.suits(Tool::Segment));
    }
}
