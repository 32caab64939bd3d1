// SPDX-License-Identifier: MPL-2.0
//! Job, tier and model identity types.

use std::fmt;

/// The transformation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Upscale and sharpen.
    Enhance,
    /// Remove the background (alpha segmentation).
    Segment,
}

impl Tool {
    /// Human-readable tool name used in status text.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Tool::Enhance => "Image Enhancement",
            Tool::Segment => "Background Removal",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Enhance => write!(f, "enhance"),
            Tool::Segment => write!(f, "segment"),
        }
    }
}

/// Learned-model tiers. The classical tier has no model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeuralTier {
    /// First choice: highest quality model.
    Primary,
    /// Second choice: smaller or more portable model.
    Secondary,
}

impl fmt::Display for NeuralTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeuralTier::Primary => write!(f, "primary"),
            NeuralTier::Secondary => write!(f, "secondary"),
        }
    }
}

/// One stage of the fallback pipeline, in attempt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// Primary learned model.
    NeuralPrimary,
    /// Secondary learned model.
    NeuralSecondary,
    /// Deterministic algorithm; never fails.
    Classical,
}

impl TierKind {
    /// All tiers in attempt order. The classical tier is always last.
    pub const ORDER: [TierKind; 3] = [
        TierKind::NeuralPrimary,
        TierKind::NeuralSecondary,
        TierKind::Classical,
    ];

    /// Returns the tier at `index` in attempt order.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ORDER.get(index).copied()
    }

    /// Returns this tier's position in attempt order.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            TierKind::NeuralPrimary => 0,
            TierKind::NeuralSecondary => 1,
            TierKind::Classical => 2,
        }
    }

    /// Returns the learned tier, or `None` for the classical tier.
    #[must_use]
    pub fn neural(self) -> Option<NeuralTier> {
        match self {
            TierKind::NeuralPrimary => Some(NeuralTier::Primary),
            TierKind::NeuralSecondary => Some(NeuralTier::Secondary),
            TierKind::Classical => None,
        }
    }

    /// Returns `true` for the classical tier.
    #[must_use]
    pub fn is_classical(self) -> bool {
        self == TierKind::Classical
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierKind::NeuralPrimary => write!(f, "primary AI model"),
            TierKind::NeuralSecondary => write!(f, "secondary AI model"),
            TierKind::Classical => write!(f, "classical algorithm"),
        }
    }
}

/// Identity of a cached model: which learned tier, for which capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId {
    /// Learned tier the model serves.
    pub tier: NeuralTier,
    /// Capability the model provides.
    pub capability: Tool,
}

impl ModelId {
    /// Creates a model identity.
    #[must_use]
    pub const fn new(capability: Tool, tier: NeuralTier) -> Self {
        Self { tier, capability }
    }

    /// Returns the identity for a pipeline tier, or `None` for the classical tier.
    #[must_use]
    pub fn for_tier(capability: Tool, tier: TierKind) -> Option<Self> {
        tier.neural().map(|tier| Self::new(capability, tier))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.capability, self.tier)
    }
}

/// Lifecycle of a model inside the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelState {
    /// Never requested, cleared, or last load failed and was discarded.
    #[default]
    Unloaded,
    /// A load is in flight.
    Loading,
    /// Loaded and memoized.
    Ready,
    /// The most recent load attempt failed; the next request retries.
    Failed,
}

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Tiers are being attempted.
    Running,
    /// Output produced.
    Done,
    /// Input fault or cancellation; no output.
    Failed,
}

/// Monotonically assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}
