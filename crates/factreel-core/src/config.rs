//! Pipeline configuration.
//!
//! Every section has defaults, so an empty TOML document is a valid
//! configuration. [`PipelineConfig::load`] parses and validates in one step.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::captions::{CaptionPolicy, SubtitleStyle};
use crate::domain::ScriptLimits;
use crate::fallback::RetryPolicy;
use crate::planner::OutputSpec;

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Job-level limits and storage location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobConfig {
    /// How many times a stage may run before the job fails (1 = no stage retries).
    pub max_stage_attempts: u32,
    /// Hard wall-clock budget for a whole job.
    pub budget_secs: u64,
    /// Root of the per-job artifact directories.
    pub storage_root: PathBuf,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_stage_attempts: 2,
            budget_secs: 900,
            storage_root: PathBuf::from("output"),
        }
    }
}

/// Timestamp normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Floor duration given to zero-length words.
    pub min_word_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_word_secs: 0.05,
        }
    }
}

/// Asset search and download settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    pub max_keywords: usize,
    /// Candidates shorter than this are discarded.
    pub min_video_secs: f64,
    /// Ranked candidates tried for download before giving up.
    pub max_download_attempts: usize,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            max_keywords: 3,
            min_video_secs: 5.0,
            max_download_attempts: 3,
        }
    }
}

/// Audio mix levels. Narration is always at unity gain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MixConfig {
    pub music_gain: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self { music_gain: 0.2 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishConfig {
    pub enabled: bool,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub job: JobConfig,
    pub timing: TimingConfig,
    pub captions: CaptionPolicy,
    pub assets: AssetConfig,
    pub output: OutputSpec,
    pub mix: MixConfig,
    pub subtitles: SubtitleStyle,
    pub script: ScriptLimits,
    pub publish: PublishConfig,
}

impl PipelineConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        let out = &self.output;
        if out.width == 0 || out.height == 0 || out.width % 2 != 0 || out.height % 2 != 0 {
            return invalid("output width and height must be positive and even");
        }
        if out.fps == 0 {
            return invalid("output fps must be positive");
        }
        if !(out.max_duration_secs > 0.0) {
            return invalid("output max_duration_secs must be positive");
        }
        if !(0.0..=1.0).contains(&self.mix.music_gain) {
            return invalid("mix music_gain must be within 0.0..=1.0");
        }
        if self.captions.max_words == 0 {
            return invalid("captions max_words must be at least 1");
        }
        if !(self.captions.max_duration_secs > 0.0) {
            return invalid("captions max_duration_secs must be positive");
        }
        if !(self.timing.min_word_secs > 0.0) {
            return invalid("timing min_word_secs must be positive");
        }
        if self.job.max_stage_attempts == 0 {
            return invalid("job max_stage_attempts must be at least 1");
        }
        if self.job.budget_secs == 0 {
            return invalid("job budget_secs must be positive");
        }
        if self.retry.call_timeout_ms == 0 {
            return invalid("retry call_timeout_ms must be positive");
        }
        if self.retry.backoff_base_ms > self.retry.backoff_max_ms {
            return invalid("retry backoff_base_ms must not exceed backoff_max_ms");
        }
        if self.assets.max_keywords == 0 || self.assets.max_download_attempts == 0 {
            return invalid("assets max_keywords and max_download_attempts must be at least 1");
        }
        Ok(())
    }
}
