// SPDX-License-Identifier: MPL-2.0
//! Tier-fallback pipeline.
//!
//! A job moves through an explicit state machine:
//!
//! ```text
//! Init -> TierAttempt(0) -> TierSuccess -> Finalizing -> Done
//!              |
//!              +-> TierFailure -> TierAttempt(1) -> ... -> TierAttempt(Classical)
//! ```
//!
//! Learned tiers fail by returning an error or a malformed output; both
//! advance to the next tier. The classical tier is last and always succeeds,
//! so a structurally valid input always reaches `Done`. Cancellation is
//! honored only at tier boundaries and ends the job in `Failed`.

use crate::application::model_cache::ModelCache;
use crate::application::port::{AIError, ModelHandle, TierOutput};
use crate::application::progress::{ProgressChannel, ProgressEvent};
use crate::config::defaults::{DEFAULT_MASK_THRESHOLD, MAX_OUTPUT_PIXELS};
use crate::domain::media::{Mask, PixelBuffer};
use crate::domain::processing::{JobId, JobStatus, ModelId, NeuralTier, TierKind, Tool};
use crate::media::composite::color_transfer;
use crate::media::enhance::ClassicalEnhancer;
use crate::media::segment::{segment_with_mask, ClassicalSegmenter};
use crate::media::{decode_image, is_cancelled, CancellationToken};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// JobError
// =============================================================================

/// Terminal job failures. Tier failures never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Input bytes are empty, undecodable or describe a zero-size image.
    InvalidInput(String),
    /// The caller cancelled the job.
    Cancelled,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            JobError::Cancelled => write!(f, "Job cancelled"),
        }
    }
}

impl std::error::Error for JobError {}

// =============================================================================
// Job
// =============================================================================

/// One unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    tool: Tool,
    input: PixelBuffer,
    tier_index: usize,
    status: JobStatus,
    output: Option<PixelBuffer>,
}

impl Job {
    /// Creates a job for an already decoded image.
    #[must_use]
    pub fn new(id: JobId, tool: Tool, input: PixelBuffer) -> Self {
        Self {
            id,
            tool,
            input,
            tier_index: 0,
            status: JobStatus::Running,
            output: None,
        }
    }

    /// Decodes `bytes` and creates a job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidInput`] for empty or undecodable bytes.
    pub fn from_bytes(id: JobId, tool: Tool, bytes: &[u8]) -> Result<Self, JobError> {
        let input = decode_image(bytes).map_err(|e| JobError::InvalidInput(e.to_string()))?;
        Ok(Self::new(id, tool, input))
    }

    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[must_use]
    pub fn input(&self) -> &PixelBuffer {
        &self.input
    }

    /// Index of the tier currently or last attempted.
    #[must_use]
    pub fn tier_index(&self) -> usize {
        self.tier_index
    }

    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Output once the job is `Done`.
    #[must_use]
    pub fn output(&self) -> Option<&PixelBuffer> {
        self.output.as_ref()
    }

    /// Consumes the job, returning `(input, output)`.
    #[must_use]
    pub fn into_parts(self) -> (PixelBuffer, Option<PixelBuffer>) {
        (self.input, self.output)
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Parameters of the classical tiers and of mask compositing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub enhancer: ClassicalEnhancer,
    pub segmenter: ClassicalSegmenter,
    /// Learned-mask confidence under which a pixel is background.
    pub mask_threshold: f32,
    /// Enhance jobs whose classical output would exceed this many pixels
    /// are rejected before any tier runs.
    pub max_output_pixels: u64,
}

impl PipelineSettings {
    /// Checks that `tool` can produce its output for `input` within
    /// [`PipelineSettings::max_output_pixels`].
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidInput`] when the output is too large.
    pub fn check_output_size(&self, tool: Tool, input: &PixelBuffer) -> Result<(), JobError> {
        let (width, height) = input.dimensions();
        let scale = match tool {
            Tool::Enhance => u64::from(self.enhancer.scale().value()),
            Tool::Segment => 1,
        };
        let pixels = u64::from(width) * scale * u64::from(height) * scale;
        if pixels > self.max_output_pixels {
            return Err(JobError::InvalidInput(format!(
                "{width}x{height} at scale {scale} gives {pixels} output pixels, limit is {}",
                self.max_output_pixels
            )));
        }
        Ok(())
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            enhancer: ClassicalEnhancer::default(),
            segmenter: ClassicalSegmenter::default(),
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            max_output_pixels: MAX_OUTPUT_PIXELS,
        }
    }
}

// =============================================================================
// State machine
// =============================================================================

/// A tier selected by index, carrying its model when it has one.
enum ResolvedTier {
    NeuralPrimary(ModelHandle),
    NeuralSecondary(ModelHandle),
    Classical,
}

/// What a successful tier produced.
enum TierResult {
    Learned(TierOutput),
    Classical(PixelBuffer),
}

enum JobState {
    Init,
    TierAttempt(usize),
    TierSuccess(TierKind, TierResult),
    TierFailure(usize, AIError),
    Finalizing(TierKind, TierResult),
    Done(TierKind, PixelBuffer),
}

const PREPARING_PERCENT: u8 = 10;
const TIER_BASE_PERCENT: u8 = 20;
const TIER_STEP_PERCENT: u8 = 20;
const FINALIZING_PERCENT: u8 = 90;

#[allow(clippy::cast_possible_truncation)]
fn tier_percent(index: usize) -> u8 {
    // index is at most 2
    TIER_BASE_PERCENT + TIER_STEP_PERCENT * index as u8
}

/// Runs jobs through the tier-fallback pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    cache: Arc<ModelCache>,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn new(cache: Arc<ModelCache>, settings: PipelineSettings) -> Self {
        Self { cache, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Replaces the classical-tier settings for subsequent jobs.
    pub fn set_settings(&mut self, settings: PipelineSettings) {
        self.settings = settings;
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Runs `job` to completion.
    ///
    /// On success the job is `Done`, its output is set, a terminal 100%
    /// event has been emitted, and the tier that produced the output is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Cancelled`] if `cancel` is triggered at a tier
    /// boundary. The job is then `Failed` and has no output.
    ///
    /// Returns [`JobError::InvalidInput`] without running any tier if the
    /// enhanced output would exceed the configured pixel limit.
    pub async fn run<T: From<ProgressEvent>>(
        &self,
        job: &mut Job,
        progress: &mut ProgressChannel<T>,
        cancel: Option<&CancellationToken>,
    ) -> Result<TierKind, JobError> {
        let name = job.tool.display_name();
        progress.begin(job.id);
        let mut state = JobState::Init;

        loop {
            state = match state {
                JobState::Init => {
                    job.status = JobStatus::Running;
                    job.output = None;
                    if let Err(err) = self.settings.check_output_size(job.tool, &job.input) {
                        tracing::warn!(job = %job.id, %err, "rejecting job");
                        job.status = JobStatus::Failed;
                        return Err(err);
                    }
                    progress.emit(PREPARING_PERCENT, format!("{name}: preparing"));
                    JobState::TierAttempt(0)
                }

                JobState::TierAttempt(index) => {
                    Self::checkpoint(job, cancel)?;
                    job.tier_index = index;
                    let tier = TierKind::from_index(index).unwrap_or(TierKind::Classical);
                    match self.attempt(job, tier, progress).await {
                        Ok(result) => JobState::TierSuccess(tier, result),
                        Err(err) => JobState::TierFailure(index, err),
                    }
                }

                JobState::TierFailure(index, err) => {
                    let failed = TierKind::from_index(index).unwrap_or(TierKind::Classical);
                    let next = TierKind::from_index(index + 1).unwrap_or(TierKind::Classical);
                    tracing::warn!(job = %job.id, tier = %failed, %err, "tier failed, falling back");
                    progress.emit(
                        tier_percent(index) + TIER_STEP_PERCENT / 2,
                        format!("{name}: {failed} unavailable, using {next}"),
                    );
                    JobState::TierAttempt(index + 1)
                }

                JobState::TierSuccess(tier, result) => {
                    tracing::info!(job = %job.id, %tier, "tier succeeded");
                    Self::checkpoint(job, cancel)?;
                    JobState::Finalizing(tier, result)
                }

                JobState::Finalizing(tier, result) => {
                    progress.emit(FINALIZING_PERCENT, format!("{name}: finalizing"));
                    JobState::Done(tier, self.finalize(job, result))
                }

                JobState::Done(tier, output) => {
                    job.output = Some(output);
                    job.status = JobStatus::Done;
                    progress.complete(format!("{name}: complete ({tier})"));
                    return Ok(tier);
                }
            };
        }
    }

    fn checkpoint(job: &mut Job, cancel: Option<&CancellationToken>) -> Result<(), JobError> {
        if cancel.is_some_and(is_cancelled) {
            tracing::info!(job = %job.id, "job cancelled");
            job.status = JobStatus::Failed;
            job.output = None;
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    async fn resolve(&self, tool: Tool, tier: TierKind) -> Result<ResolvedTier, AIError> {
        match tier {
            TierKind::NeuralPrimary => {
                let id = ModelId::new(tool, NeuralTier::Primary);
                Ok(ResolvedTier::NeuralPrimary(self.cache.get_or_load(id).await?))
            }
            TierKind::NeuralSecondary => {
                let id = ModelId::new(tool, NeuralTier::Secondary);
                Ok(ResolvedTier::NeuralSecondary(self.cache.get_or_load(id).await?))
            }
            TierKind::Classical => Ok(ResolvedTier::Classical),
        }
    }

    async fn attempt<T: From<ProgressEvent>>(
        &self,
        job: &Job,
        tier: TierKind,
        progress: &mut ProgressChannel<T>,
    ) -> Result<TierResult, AIError> {
        let name = job.tool.display_name();
        let base = tier_percent(tier.index());

        if !tier.is_classical() {
            progress.emit(base, format!("{name}: loading {tier}"));
        }
        let resolved = self.resolve(job.tool, tier).await?;
        progress.emit(base + TIER_STEP_PERCENT / 4, format!("{name}: running {tier}"));

        match resolved {
            ResolvedTier::NeuralPrimary(model) | ResolvedTier::NeuralSecondary(model) => {
                Self::run_model(&model, job).map(TierResult::Learned)
            }
            ResolvedTier::Classical => Ok(TierResult::Classical(match job.tool {
                Tool::Enhance => self.settings.enhancer.enhance(&job.input),
                Tool::Segment => self.settings.segmenter.segment(&job.input),
            })),
        }
    }

    fn run_model(model: &ModelHandle, job: &Job) -> Result<TierOutput, AIError> {
        let (width, height) = job.input.dimensions();
        let caps = model.capabilities();
        if !caps.supports_size(width, height) {
            return Err(AIError::InputTooLarge {
                max: caps.input_size_limit.unwrap_or((width, height)),
                actual: (width, height),
            });
        }

        let output = model.infer(&job.input)?;
        if !output.suits(job.tool) {
            return Err(AIError::MalformedOutput(format!(
                "{} returned an output unusable for {}",
                caps.name, job.tool
            )));
        }
        output.validate(width, height, caps.scale_factor)?;
        Ok(output)
    }

    fn finalize(&self, job: &Job, result: TierResult) -> PixelBuffer {
        match result {
            TierResult::Classical(image) => image,
            TierResult::Learned(TierOutput::Image(image)) => match job.tool {
                Tool::Enhance => image,
                // A cutout carries its mask in the alpha channel
                Tool::Segment => segment_with_mask(
                    &job.input,
                    &Mask::from_alpha(&image),
                    self.settings.mask_threshold,
                ),
            },
            TierResult::Learned(TierOutput::Luma(luma)) => color_transfer(&job.input, &luma),
            TierResult::Learned(TierOutput::Mask(mask)) => {
                segment_with_mask(&job.input, &mask, self.settings.mask_threshold)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::port::{Backend, ModelProvider, ProcessorCapabilities, TierModel};
    use crate::application::progress::channel;
    use crate::domain::processing::ScaleFactor;
    use crate::media::new_cancellation_token;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Serves one fixed model for every id, or fails every load.
    struct StaticProvider {
        model: Option<ModelHandle>,
    }

    impl ModelProvider for StaticProvider {
        fn load(&self, _id: ModelId) -> BoxFuture<'static, Result<ModelHandle, AIError>> {
            let model = self.model.clone();
            async move { model.ok_or(AIError::ModelNotReady) }.boxed()
        }

        fn backend(&self) -> Backend {
            Backend::CpuFallback
        }
    }

    struct OutputModel {
        output: TierOutput,
        scale: Option<u32>,
    }

    impl TierModel for OutputModel {
        fn infer(&self, _image: &PixelBuffer) -> Result<TierOutput, AIError> {
            Ok(self.output.clone())
        }

        fn capabilities(&self) -> ProcessorCapabilities {
            match self.scale {
                Some(scale) => ProcessorCapabilities::upscaler("test", ScaleFactor::new(scale)),
                None => ProcessorCapabilities::new("test"),
            }
        }
    }

    fn orchestrator(model: Option<ModelHandle>) -> PipelineOrchestrator {
        let cache = Arc::new(ModelCache::new(Arc::new(StaticProvider { model })));
        PipelineOrchestrator::new(cache, PipelineSettings::default())
    }

    fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn failing_models_fall_back_to_classical() {
        let orchestrator = orchestrator(None);
        let input = PixelBuffer::filled(6, 4, [10, 20, 30, 255]);
        let mut job = Job::new(JobId(1), Tool::Enhance, input.clone());
        let (mut progress, mut rx) = channel();

        let tier = orchestrator.run(&mut job, &mut progress, None).await.unwrap();

        assert_eq!(tier, TierKind::Classical);
        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(job.tier_index(), 2);
        let expected = ClassicalEnhancer::default().enhance(&input);
        assert_eq!(job.output(), Some(&expected));

        let events = drain(&mut rx);
        assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert!(events.last().unwrap().percent.is_complete());
        // At least one event per tier attempt plus the terminal one
        assert!(events.len() >= 4);
    }

    #[tokio::test]
    async fn valid_learned_output_is_used() {
        let upscaled = PixelBuffer::filled(8, 8, [1, 2, 3, 255]);
        let model: ModelHandle = Arc::new(OutputModel {
            output: TierOutput::Image(upscaled.clone()),
            scale: Some(4),
        });
        let orchestrator = orchestrator(Some(model));
        let mut job = Job::new(JobId(2), Tool::Enhance, PixelBuffer::filled(2, 2, [0; 4]));
        let (mut progress, _rx) = channel::<ProgressEvent>();

        let tier = orchestrator.run(&mut job, &mut progress, None).await.unwrap();
        assert_eq!(tier, TierKind::NeuralPrimary);
        assert_eq!(job.output(), Some(&upscaled));
    }

    #[tokio::test]
    async fn wrong_scale_is_a_tier_failure() {
        let model: ModelHandle = Arc::new(OutputModel {
            output: TierOutput::Image(PixelBuffer::filled(3, 3, [0; 4])),
            scale: Some(4),
        });
        let orchestrator = orchestrator(Some(model));
        let mut job = Job::new(JobId(3), Tool::Enhance, PixelBuffer::filled(2, 2, [0; 4]));
        let (mut progress, _rx) = channel::<ProgressEvent>();

        let tier = orchestrator.run(&mut job, &mut progress, None).await.unwrap();
        assert_eq!(tier, TierKind::Classical);
    }

    #[tokio::test]
    async fn luma_output_is_color_transferred() {
        let model: ModelHandle = Arc::new(OutputModel {
            output: TierOutput::Luma(Mask::new(2, 2, vec![200.0 / 255.0; 4])),
            scale: Some(2),
        });
        let orchestrator = orchestrator(Some(model));
        let input = PixelBuffer::filled(1, 1, [100, 100, 100, 255]);
        let mut job = Job::new(JobId(4), Tool::Enhance, input);
        let (mut progress, _rx) = channel::<ProgressEvent>();

        orchestrator.run(&mut job, &mut progress, None).await.unwrap();
        assert_eq!(job.output().unwrap().pixel(0, 0), [200, 200, 200, 255]);
    }

    #[tokio::test]
    async fn mask_for_enhance_is_rejected() {
        let model: ModelHandle = Arc::new(OutputModel {
            output: TierOutput::Mask(Mask::new(1, 1, vec![1.0])),
            scale: None,
        });
        let orchestrator = orchestrator(Some(model));
        let mut job = Job::new(JobId(5), Tool::Enhance, PixelBuffer::filled(3, 3, [0; 4]));
        let (mut progress, _rx) = channel::<ProgressEvent>();

        let tier = orchestrator.run(&mut job, &mut progress, None).await.unwrap();
        assert_eq!(tier, TierKind::Classical);
    }

    #[tokio::test]
    async fn cancellation_fails_job_without_output() {
        let orchestrator = orchestrator(None);
        let mut job = Job::new(JobId(6), Tool::Segment, PixelBuffer::filled(4, 4, [0; 4]));
        let (mut progress, mut rx) = channel();
        let token = new_cancellation_token();
        token.store(true, Ordering::SeqCst);

        let result = orchestrator.run(&mut job, &mut progress, Some(&token)).await;

        assert_eq!(result, Err(JobError::Cancelled));
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.output().is_none());
        assert!(drain(&mut rx).iter().all(|e| !e.percent.is_complete()));
    }

    #[tokio::test]
    async fn oversized_enhance_output_is_rejected_before_any_tier() {
        let provider = Arc::new(StaticProvider { model: None });
        let cache = Arc::new(ModelCache::new(provider));
        let settings = PipelineSettings {
            enhancer: ClassicalEnhancer::new(ScaleFactor::new(8), 1.0),
            max_output_pixels: 64 * 64,
            ..PipelineSettings::default()
        };
        let orchestrator = PipelineOrchestrator::new(Arc::clone(&cache), settings);
        let mut job = Job::new(JobId(8), Tool::Enhance, PixelBuffer::filled(9, 8, [0; 4]));
        let (mut progress, mut rx) = channel();

        let result = orchestrator.run(&mut job, &mut progress, None).await;

        assert!(matches!(result, Err(JobError::InvalidInput(_))));
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.output().is_none());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(cache.ready_count(), 0);
    }

    #[test]
    fn output_limit_is_inclusive_and_ignores_scale_for_segment() {
        let settings = PipelineSettings {
            enhancer: ClassicalEnhancer::new(ScaleFactor::new(8), 1.0),
            max_output_pixels: 64 * 64,
            ..PipelineSettings::default()
        };
        let at_limit = PixelBuffer::filled(8, 8, [0; 4]);
        let over = PixelBuffer::filled(9, 8, [0; 4]);

        assert_eq!(settings.check_output_size(Tool::Enhance, &at_limit), Ok(()));
        assert!(settings.check_output_size(Tool::Enhance, &over).is_err());
        assert_eq!(settings.check_output_size(Tool::Segment, &over), Ok(()));
    }

    #[test]
    fn default_limit_rejects_largest_scale_on_a_4k_square() {
        let settings = PipelineSettings {
            enhancer: ClassicalEnhancer::new(ScaleFactor::new(8), 1.0),
            ..PipelineSettings::default()
        };
        let input = PixelBuffer::filled(4096, 4096, [0; 4]);
        assert!(matches!(
            settings.check_output_size(Tool::Enhance, &input),
            Err(JobError::InvalidInput(_))
        ));
        assert_eq!(settings.check_output_size(Tool::Segment, &input), Ok(()));
    }

    #[test]
    fn empty_bytes_are_invalid_input() {
        let result = Job::from_bytes(JobId(7), Tool::Enhance, &[]);
        assert!(matches!(result, Err(JobError::InvalidInput(_))));
    }
}
