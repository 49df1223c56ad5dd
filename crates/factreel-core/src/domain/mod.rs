//! Domain models for factreel.
//!
//! Canonical definitions for the pipeline artifacts:
//! - `Fact`: Seed text for one video
//! - `Script`: Narration text and publishing metadata derived from a fact
//! - `NarrationResult`: Synthesized audio plus word-level timing
//! - `CaptionEvent`: One on-screen subtitle chunk
//! - `VideoCandidate` / `VisualAsset` / `MusicAsset`: Stock media
//! - `PipelineJob`: One end-to-end run of the pipeline

pub mod asset;
pub mod caption;
pub mod error;
pub mod fact;
pub mod job;
pub mod narration;
pub mod script;

// Re-export main types and errors
pub use asset::{MusicAsset, Resolution, SelectedAssets, VideoCandidate, VisualAsset};
pub use caption::{CaptionEvent, HighlightSpan};
pub use error::{ErrorKind, NarrationTimingError, PipelineError, ProviderError, Result};
pub use fact::Fact;
pub use job::{JobArtifacts, JobErrorRecord, JobId, JobStatus, PipelineJob, Stage};
pub use narration::{NarrationResult, WordTimestamp};
pub use script::{Script, ScriptLimits};
