// SPDX-License-Identifier: MPL-2.0
//! ONNX Runtime adapter implementing the [`TierModel`] port trait.
//!
//! One adapter covers every configured model; the [`OutputKind`] of its
//! [`ModelSpec`] decides how the image is fed in and how the output tensor
//! is read back.

use super::tensor::{
    clamp_plane, image_from_tensor, luma_tensor, plane_from_tensor, resize_rgba, rgb_tensor,
    with_alpha_from,
};
use crate::application::port::{AIError, ProcessorCapabilities, TierModel, TierOutput};
use crate::config::{ModelSpec, OutputKind};
use crate::domain::media::PixelBuffer;
use crate::media::composite::resize_mask;
use ndarray::Array4;
use ort::session::Session;
use std::borrow::Cow;
use std::sync::{Mutex, PoisonError};

/// A loaded ONNX model serving one neural tier.
///
/// The session sits behind a mutex because `ort` needs `&mut Session` to
/// run; a released adapter answers every call with
/// [`AIError::ModelNotReady`].
pub struct OnnxTierModel {
    spec: ModelSpec,
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for OnnxTierModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxTierModel")
            .field("model", &self.spec.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl OnnxTierModel {
    /// Wraps a committed session.
    #[must_use]
    pub fn new(spec: ModelSpec, session: Session) -> Self {
        Self {
            spec,
            session: Mutex::new(Some(session)),
        }
    }

    /// An adapter with no session, as after [`TierModel::release`].
    #[cfg(test)]
    fn unloaded(spec: ModelSpec) -> Self {
        Self {
            spec,
            session: Mutex::new(None),
        }
    }

    /// Model configuration.
    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Returns `true` until [`TierModel::release`] is called.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Runs the session and copies out the first output tensor.
    fn run(&self, input: &Array4<f32>) -> Result<(Vec<i64>, Vec<f32>), AIError> {
        let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let session = guard.as_mut().ok_or(AIError::ModelNotReady)?;

        let input = input.as_standard_layout().into_owned();
        let input_name = session
            .inputs()
            .first()
            .map_or_else(|| "input".to_string(), |i| i.name().to_string());

        let input_ref = ort::value::TensorRef::from_array_view(&input)
            .map_err(|e| AIError::InferenceFailed(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![input_name.as_str() => input_ref])
            .map_err(|e| AIError::InferenceFailed(e.to_string()))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| AIError::MalformedOutput("no output tensor".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e: ort::Error| AIError::MalformedOutput(e.to_string()))?;

        Ok((shape.to_vec(), data.to_vec()))
    }
}

/// Rejects inputs with an edge above `limit`.
fn check_input_size(width: u32, height: u32, limit: u32) -> Result<(), AIError> {
    if width > limit || height > limit {
        return Err(AIError::InputTooLarge {
            max: (limit, limit),
            actual: (width, height),
        });
    }
    Ok(())
}

impl TierModel for OnnxTierModel {
    fn infer(&self, image: &PixelBuffer) -> Result<TierOutput, AIError> {
        let (width, height) = image.dimensions();
        check_input_size(width, height, self.spec.input_limit())?;

        // Fixed-input models see a resized copy; their output is mapped
        // back to the caller's resolution below. Image outputs never come
        // from a shrunk copy, see `ModelSpec::input_limit`.
        let input: Cow<'_, PixelBuffer> = match self.spec.input_size {
            Some(edge) => Cow::Owned(resize_rgba(image, edge, edge)?),
            None => Cow::Borrowed(image),
        };
        let fixed = self.spec.input_size.is_some();
        let (out_w, out_h) = self.spec.scale_factor().apply_to_dimensions(width, height);

        match self.spec.output {
            OutputKind::Rgb => {
                let (shape, data) = self.run(&rgb_tensor(&input, self.spec.normalization))?;
                let mut output = image_from_tensor(&shape, &data)?;
                if fixed {
                    output = resize_rgba(&output, out_w, out_h)?;
                }
                Ok(TierOutput::Image(with_alpha_from(output, image)))
            }
            OutputKind::Luma => {
                let (shape, data) = self.run(&luma_tensor(&input))?;
                let mut luma = clamp_plane(&plane_from_tensor(&shape, &data)?);
                if fixed {
                    luma = resize_mask(&luma, out_w, out_h);
                }
                Ok(TierOutput::Luma(luma))
            }
            OutputKind::Mask => {
                let (shape, data) = self.run(&rgb_tensor(&input, self.spec.normalization))?;
                let mask = plane_from_tensor(&shape, &data)?;
                Ok(TierOutput::Mask(if self.spec.invert_mask {
                    mask.inverted()
                } else {
                    mask
                }))
            }
        }
    }

    fn capabilities(&self) -> ProcessorCapabilities {
        let capabilities = match self.spec.output {
            OutputKind::Mask => ProcessorCapabilities::new(self.spec.name.clone()),
            OutputKind::Rgb | OutputKind::Luma => {
                ProcessorCapabilities::upscaler(self.spec.name.clone(), self.spec.scale_factor())
            }
        };
        let limit = self.spec.input_limit();
        capabilities.with_input_limit(limit, limit)
    }

    fn release(&self) {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if session.is_some() {
            tracing::debug!(model = %self.spec.name, "ONNX session released");
        }
    }
}
