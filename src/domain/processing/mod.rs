// SPDX-License-Identifier: MPL-2.0
//! Processing domain: tools, tiers, model identities and value objects.

mod newtypes;
mod types;

pub use newtypes::{scale_bounds, ProgressPercent, ScaleFactor};
pub use types::{JobId, JobStatus, ModelId, ModelState, NeuralTier, TierKind, Tool};
