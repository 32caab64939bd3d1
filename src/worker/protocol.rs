// SPDX-License-Identifier: MPL-2.0
//! Messages exchanged with a worker.
//!
//! Both directions are adjacently tagged: `{"type": "...", "data": {...}}`.
//! Inbound messages are handled strictly in order, and every outbound event
//! of a job (progress included) travels on one ordered stream.

use crate::application::orchestrator::{JobError, PipelineSettings};
use crate::application::port::Backend;
use crate::application::progress::ProgressEvent;
use crate::domain::media::PixelBuffer;
use crate::domain::processing::{ScaleFactor, Tool};
use crate::error::Error;
use crate::media::enhance::ClassicalEnhancer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tool names on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolName {
    Enhancer,
    BgRemover,
}

impl From<ToolName> for Tool {
    fn from(name: ToolName) -> Self {
        match name {
            ToolName::Enhancer => Tool::Enhance,
            ToolName::BgRemover => Tool::Segment,
        }
    }
}

impl From<Tool> for ToolName {
    fn from(tool: Tool) -> Self {
        match tool {
            Tool::Enhance => ToolName::Enhancer,
            Tool::Segment => ToolName::BgRemover,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolName::Enhancer => write!(f, "enhancer"),
            ToolName::BgRemover => write!(f, "bg-remover"),
        }
    }
}

/// Per-job overrides of the configured classical settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Classical upscale factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Unsharp mask strength.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpen_amount: Option<f32>,
}

impl ProcessOptions {
    /// Returns `base` with these overrides applied.
    #[must_use]
    pub fn apply(&self, base: PipelineSettings) -> PipelineSettings {
        if self.scale.is_none() && self.sharpen_amount.is_none() {
            return base;
        }
        let scale = self.scale.map_or(base.enhancer.scale(), ScaleFactor::new);
        let amount = self.sharpen_amount.unwrap_or(base.enhancer.amount());
        PipelineSettings {
            enhancer: ClassicalEnhancer::new(scale, amount),
            ..base
        }
    }
}

/// Caller → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Inbound {
    /// Warm up the learned tiers of `tool`.
    Init { tool: ToolName },
    /// Run one job on encoded image bytes.
    Process {
        file: Vec<u8>,
        tool: ToolName,
        #[serde(default)]
        options: ProcessOptions,
    },
    /// Release every cached model.
    Cleanup,
}

/// RGBA pixels with their dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl From<PixelBuffer> for ImagePayload {
    fn from(image: PixelBuffer) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_rgba_bytes(),
            width,
            height,
        }
    }
}

impl TryFrom<ImagePayload> for PixelBuffer {
    type Error = crate::domain::error::ShapeError;

    fn try_from(payload: ImagePayload) -> Result<Self, Self::Error> {
        PixelBuffer::try_new(payload.width, payload.height, payload.data)
    }
}

/// Worker → caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Outbound {
    /// Non-decreasing job progress.
    Progress { percent: u8, status: String },
    /// Reply to [`Inbound::Init`].
    Initialized { backend: String },
    /// Terminal success.
    Complete {
        result: ImagePayload,
        original: ImagePayload,
    },
    /// Terminal failure for inputs that cannot be processed.
    Error { error: String },
    /// Terminal event of a job cancelled by the caller.
    Cancelled,
}

impl Outbound {
    /// Returns `true` for the events that end a job.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Outbound::Complete { .. } | Outbound::Error { .. } | Outbound::Cancelled
        )
    }

    /// Builds the reply to an init request.
    #[must_use]
    pub fn initialized(backend: Backend) -> Self {
        Outbound::Initialized {
            backend: backend.as_str().to_string(),
        }
    }

    /// The terminal reply for a job that ended without a result.
    #[must_use]
    pub fn refused(err: JobError) -> Self {
        match err {
            JobError::InvalidInput(reason) => Outbound::Error { error: reason },
            JobError::Cancelled => Outbound::Cancelled,
        }
    }

    /// The crate error for a job that ended without a result.
    ///
    /// The worker only reports `error` for input it refused, so it maps to
    /// [`Error::InvalidInput`].
    #[must_use]
    pub fn failure(&self) -> Option<Error> {
        match self {
            Outbound::Error { error } => Some(Error::InvalidInput(error.clone())),
            Outbound::Cancelled => Some(Error::Worker("job cancelled".to_string())),
            _ => None,
        }
    }
}

impl From<ProgressEvent> for Outbound {
    fn from(event: ProgressEvent) -> Self {
        Outbound::Progress {
            percent: event.percent.value(),
            status: event.status,
        }
    }
}
