//! factreel core library
//!
//! The content-to-video assembly pipeline: stage orchestration, provider
//! fallback, word timing, caption timelines, asset ranking and assembly
//! planning. Concrete providers live in `factreel-providers`.

pub mod captions;
pub mod config;
pub mod domain;
pub mod fallback;
pub mod keywords;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod planner;
pub mod providers;
pub mod ranker;
pub mod store;
pub mod telemetry;
pub mod timing;
pub mod workspace;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use captions::{build_caption_timeline, render_ass, CaptionPolicy, SubtitleStyle};

pub use config::{ConfigError, PipelineConfig};

pub use domain::{
    CaptionEvent, ErrorKind, Fact, JobId, JobStatus, MusicAsset, NarrationResult,
    NarrationTimingError, PipelineError, PipelineJob, ProviderError, Resolution, Result, Script,
    ScriptLimits, Stage, VideoCandidate, VisualAsset, WordTimestamp,
};

pub use fallback::{ChainSuccess, FallbackError, ProviderChain, ProviderFailure, RetryPolicy};

pub use orchestrator::{cancellation, CancelToken, JobCanceller, Orchestrator, Providers};

pub use planner::{AssemblyPlan, AssemblyPlanner, OutputSpec, RenderTarget};

pub use providers::{
    FactProvider, MusicAssetProvider, NarrationProvider, Provider, ProviderResult, Publisher,
    Renderer, ScriptProvider, VideoAssetProvider,
};

pub use store::{JobStore, MemoryJobStore, StoreError};

pub use timing::{interpolate_word_timestamps, normalize_word_timestamps};
