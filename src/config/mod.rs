// SPDX-License-Identifier: MPL-2.0
//! This module handles the pipeline configuration, including loading and saving
//! settings to a `settings.toml` file.
//!
//! # Configuration Sections
//!
//! - `[enhance]` - Classical upscale factor and sharpening strength
//! - `[segment]` - Background classification thresholds
//! - `[models]` - Learned model per tool and tier
//! - `[runtime]` - Execution backend and download policy
//!
//! # Path Resolution
//!
//! The config file location can be customized for testing or portable deployments:
//! 1. Use `load_from_path()`/`save_to_path()` with explicit path
//! 2. Pass `--config-dir` or set `LENS_REFINE_CONFIG_DIR`
//! 3. Falls back to platform-specific config directory
//!
//! # Examples
//!
//! ```no_run
//! use lens_refine::config::{self, Config};
//!
//! let mut config = config::load().unwrap_or_default();
//! config.enhance.scale = 4;
//! config::save(&config).expect("Failed to save config");
//! ```

pub mod defaults;
pub mod paths;

pub use defaults::*;

use crate::application::orchestrator::PipelineSettings;
use crate::domain::processing::{ModelId, NeuralTier, ScaleFactor, Tool};
use crate::error::{Error, Result};
use crate::media::enhance::ClassicalEnhancer;
use crate::media::segment::ClassicalSegmenter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "settings.toml";

// =============================================================================
// Enums (shared between sections)
// =============================================================================

/// What a learned model returns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    /// NCHW RGB image at the declared scale.
    Rgb,
    /// Single luminance plane at the declared scale; needs color transfer.
    Luma,
    /// Single confidence plane at any resolution.
    Mask,
}

/// How RGB input values are normalized before inference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// `value / 255`.
    #[default]
    Unit,
    /// `(value / 255 - mean) / std` with ImageNet statistics.
    Imagenet,
}

// =============================================================================
// Section Structs
// =============================================================================

/// Classical enhancement settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnhanceConfig {
    /// Upscale factor for the classical tier (1-8).
    #[serde(default = "default_scale")]
    pub scale: u32,

    /// Unsharp mask strength (0-5).
    #[serde(default = "default_sharpen_amount")]
    pub sharpen_amount: f32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            sharpen_amount: DEFAULT_SHARPEN_AMOUNT,
        }
    }
}

/// Segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentConfig {
    /// RGB distance under which a pixel matches a dominant color.
    #[serde(default = "default_background_distance")]
    pub background_distance: f32,

    /// Confidence under which a learned mask marks background.
    #[serde(default = "default_mask_threshold")]
    pub mask_threshold: f32,

    /// Number of dominant colors treated as background.
    #[serde(default = "default_dominant_colors")]
    pub dominant_colors: usize,

    /// Histogram bucket width per channel.
    #[serde(default = "default_bucket_width")]
    pub bucket_width: u8,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            background_distance: DEFAULT_BACKGROUND_DISTANCE,
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            dominant_colors: DEFAULT_DOMINANT_COLORS,
            bucket_width: DEFAULT_BUCKET_WIDTH,
        }
    }
}

/// A learned model used by one neural tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSpec {
    /// File stem under the models directory.
    pub name: String,

    /// Download location.
    pub url: String,

    /// Expected BLAKE3 hash of the model file (hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,

    /// Output tensor interpretation.
    pub output: OutputKind,

    /// Declared upscale factor of the output (1 for masks).
    #[serde(default = "default_model_scale")]
    pub scale: u32,

    /// Fixed square input edge, if the model has static input dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_size: Option<u32>,

    /// Input normalization.
    #[serde(default)]
    pub normalization: Normalization,

    /// The mask holds background rather than foreground confidence.
    #[serde(default)]
    pub invert_mask: bool,

    /// Largest accepted input edge; larger inputs skip to the next tier.
    #[serde(default = "default_max_input")]
    pub max_input: u32,

    /// Disabled models are treated as unconfigured.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ModelSpec {
    /// Default luminance super-resolution model for the primary enhance tier.
    #[must_use]
    pub fn default_enhance_primary() -> Self {
        Self {
            name: DEFAULT_ENHANCE_PRIMARY_NAME.to_string(),
            url: DEFAULT_ENHANCE_PRIMARY_URL.to_string(),
            blake3: None,
            output: OutputKind::Luma,
            scale: DEFAULT_ENHANCE_PRIMARY_SCALE,
            input_size: Some(DEFAULT_ENHANCE_PRIMARY_INPUT),
            normalization: Normalization::Unit,
            invert_mask: false,
            max_input: DEFAULT_MAX_INPUT_DIMENSION,
            enabled: true,
        }
    }

    /// Default salient-object model for the primary segment tier.
    #[must_use]
    pub fn default_segment_primary() -> Self {
        Self {
            name: DEFAULT_SEGMENT_PRIMARY_NAME.to_string(),
            url: DEFAULT_SEGMENT_PRIMARY_URL.to_string(),
            blake3: None,
            output: OutputKind::Mask,
            scale: 1,
            input_size: Some(DEFAULT_SEGMENT_PRIMARY_INPUT),
            normalization: Normalization::Imagenet,
            invert_mask: false,
            max_input: DEFAULT_MAX_INPUT_DIMENSION,
            enabled: true,
        }
    }

    /// Declared scale as a bounded factor.
    #[must_use]
    pub fn scale_factor(&self) -> ScaleFactor {
        ScaleFactor::new(self.scale)
    }

    /// Largest input edge the model is run on.
    ///
    /// For image-producing models with a fixed input this is the smaller of
    /// `input_size` and `max_input`; larger images go to the next tier
    /// instead of being shrunk. Mask models keep `max_input`.
    #[must_use]
    pub fn input_limit(&self) -> u32 {
        match (self.output, self.input_size) {
            (OutputKind::Rgb | OutputKind::Luma, Some(edge)) => edge.min(self.max_input),
            _ => self.max_input,
        }
    }
}

/// Learned models per tool and tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhance_primary: Option<ModelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhance_secondary: Option<ModelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_primary: Option<ModelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_secondary: Option<ModelSpec>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            enhance_primary: Some(ModelSpec::default_enhance_primary()),
            enhance_secondary: None,
            segment_primary: Some(ModelSpec::default_segment_primary()),
            segment_secondary: None,
        }
    }
}

impl ModelsConfig {
    /// Returns the enabled model configured for `id`.
    #[must_use]
    pub fn spec(&self, id: ModelId) -> Option<&ModelSpec> {
        let slot = match (id.capability, id.tier) {
            (Tool::Enhance, NeuralTier::Primary) => &self.enhance_primary,
            (Tool::Enhance, NeuralTier::Secondary) => &self.enhance_secondary,
            (Tool::Segment, NeuralTier::Primary) => &self.segment_primary,
            (Tool::Segment, NeuralTier::Secondary) => &self.segment_secondary,
        };
        slot.as_ref().filter(|spec| spec.enabled)
    }
}

/// Execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Use a GPU execution provider when one is available.
    #[serde(default = "default_enabled")]
    pub prefer_gpu: bool,

    /// Never download; missing model files count as tier failures.
    #[serde(default)]
    pub offline: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prefer_gpu: true,
            offline: false,
        }
    }
}

// =============================================================================
// Main Config Struct (Sectioned)
// =============================================================================

/// Pipeline configuration with logical sections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub enhance: EnhanceConfig,

    #[serde(default)]
    pub segment: SegmentConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Builds the classical-tier settings used by the orchestrator.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            enhancer: ClassicalEnhancer::new(
                ScaleFactor::new(self.enhance.scale),
                self.enhance.sharpen_amount,
            ),
            segmenter: ClassicalSegmenter::new(
                self.segment.background_distance,
                self.segment.dominant_colors,
                self.segment.bucket_width,
            ),
            mask_threshold: self.segment.mask_threshold,
            max_output_pixels: MAX_OUTPUT_PIXELS,
        }
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_scale() -> u32 {
    DEFAULT_SCALE
}

fn default_sharpen_amount() -> f32 {
    DEFAULT_SHARPEN_AMOUNT
}

fn default_background_distance() -> f32 {
    DEFAULT_BACKGROUND_DISTANCE
}

fn default_mask_threshold() -> f32 {
    DEFAULT_MASK_THRESHOLD
}

fn default_dominant_colors() -> usize {
    DEFAULT_DOMINANT_COLORS
}

fn default_bucket_width() -> u8 {
    DEFAULT_BUCKET_WIDTH
}

fn default_model_scale() -> u32 {
    1
}

fn default_max_input() -> u32 {
    DEFAULT_MAX_INPUT_DIMENSION
}

fn default_enabled() -> bool {
    true
}

// =============================================================================
// Config Path Resolution
// =============================================================================

fn get_config_path_with_override(base_dir: Option<PathBuf>) -> Option<PathBuf> {
    paths::get_app_config_dir_with_override(base_dir).map(|mut path| {
        path.push(CONFIG_FILE);
        path
    })
}

// =============================================================================
// Load Functions
// =============================================================================

/// Loads the configuration from the default path.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file exists but is not valid TOML.
pub fn load() -> Result<Config> {
    load_with_override(None)
}

/// Loads the configuration from a custom directory. A missing file yields
/// the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_with_override(base_dir: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = get_config_path_with_override(base_dir) {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(Config::default())
}

/// Loads configuration from a specific path.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

// =============================================================================
// Save Functions
// =============================================================================

/// Saves the configuration to the default path.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save(config: &Config) -> Result<()> {
    save_with_override(config, None)
}

/// Saves the configuration to a custom directory.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save_with_override(config: &Config, base_dir: Option<PathBuf>) -> Result<()> {
    if let Some(path) = get_config_path_with_override(base_dir) {
        return save_to_path(config, &path);
    }
    Ok(())
}

/// Saves configuration to a specific path.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config).map_err(Error::from)?;
    fs::write(path, content)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
