// SPDX-License-Identifier: MPL-2.0
//! Application layer - Use cases and orchestration.
//!
//! - [`port`]: Trait definitions (interfaces) for dependency inversion
//! - [`model_cache`]: Single-flight, memoizing model loader
//! - [`progress`]: Ordered progress events
//! - [`orchestrator`]: Tier-fallback state machine
//!
//! # Dependency Rule
//!
//! - Application layer depends on domain layer and the pure `media` algorithms
//! - Infrastructure layer implements application layer ports
//! - The worker drives the orchestrator and owns the cache

pub mod model_cache;
pub mod orchestrator;
pub mod port;
pub mod progress;

pub use model_cache::ModelCache;
pub use orchestrator::{Job, JobError, PipelineOrchestrator, PipelineSettings};
pub use progress::{ProgressChannel, ProgressEvent};
