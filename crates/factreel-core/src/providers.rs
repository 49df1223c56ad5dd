//! Capability interfaces consumed by the pipeline.
//!
//! Each stage that needs an external collaborator talks to it through one of
//! these traits. Concrete implementations live outside the core crate and are
//! combined into ordered [`ProviderChain`](crate::fallback::ProviderChain)s.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{Fact, MusicAsset, NarrationResult, ProviderError, Script, VideoCandidate};
use crate::planner::AssemblyPlan;

/// Result type for a single provider call.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Behaviour shared by every capability implementation.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable name used in logs, error records and asset ids.
    fn name(&self) -> &str;

    /// Cheap reachability check. Defaults to "always ready".
    async fn probe(&self) -> ProviderResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait FactProvider: Provider {
    async fn fetch(&self) -> ProviderResult<Fact>;
}

#[async_trait]
pub trait ScriptProvider: Provider {
    async fn generate(&self, fact: &Fact) -> ProviderResult<Script>;
}

/// Speech synthesis with word-level timing.
///
/// Implementations that cannot report timings fill them in with
/// [`interpolate_word_timestamps`](crate::timing::interpolate_word_timestamps).
/// The returned timings may be raw; the pipeline normalizes them.
#[async_trait]
pub trait NarrationProvider: Provider {
    async fn synthesize(&self, script: &Script, out_dir: &Path) -> ProviderResult<NarrationResult>;
}

#[async_trait]
pub trait VideoAssetProvider: Provider {
    async fn search(&self, keywords: &[String]) -> ProviderResult<Vec<VideoCandidate>>;

    /// Download `candidate` into `out_dir` and return the local file.
    async fn download(&self, candidate: &VideoCandidate, out_dir: &Path) -> ProviderResult<PathBuf>;
}

#[async_trait]
pub trait MusicAssetProvider: Provider {
    async fn list(&self) -> ProviderResult<Vec<MusicAsset>>;
}

#[async_trait]
pub trait Renderer: Provider {
    /// Execute the plan and return the rendered file.
    ///
    /// A non-zero exit of the external tool is [`ProviderError::RenderFailed`].
    async fn render(&self, plan: &AssemblyPlan) -> ProviderResult<PathBuf>;
}

#[async_trait]
pub trait Publisher: Provider {
    /// Upload the video and return its remote id.
    async fn upload(&self, video: &Path, script: &Script) -> ProviderResult<String>;
}
