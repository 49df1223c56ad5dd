//! Deterministic in-process providers shared by the pipeline tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use factreel_core::domain::{
    Fact, MusicAsset, NarrationResult, ProviderError, Resolution, Script, VideoCandidate,
};
use factreel_core::orchestrator::{JobCanceller, Providers};
use factreel_core::planner::AssemblyPlan;
use factreel_core::providers::{
    FactProvider, MusicAssetProvider, NarrationProvider, Provider, ProviderResult, Publisher,
    Renderer, ScriptProvider, VideoAssetProvider,
};
use factreel_core::timing::interpolate_word_timestamps;
use factreel_core::PipelineConfig;

pub const OCTOPUS: &str = "Octopuses have three hearts and blue blood.";

/// Seconds of narration per word.
pub const WORD_SECS: f64 = 0.4;

pub fn test_config(storage_root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.job.storage_root = storage_root.to_path_buf();
    config.retry.backoff_base_ms = 1;
    config.retry.backoff_max_ms = 1;
    config
}

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

pub struct StaticFacts {
    pub name: String,
    pub text: String,
    pub calls: AtomicU32,
}

impl StaticFacts {
    pub fn new(name: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            text: text.into(),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Provider for StaticFacts {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl FactProvider for StaticFacts {
    async fn fetch(&self) -> ProviderResult<Fact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Fact::new(self.text.clone(), "animals", format!("{}-1", self.name)))
    }
}

/// Fails with the given error for the first `failures` calls, then succeeds.
pub struct FlakyFacts {
    pub failures: u32,
    pub error: ProviderError,
    pub calls: AtomicU32,
}

impl FlakyFacts {
    pub fn new(failures: u32, error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            failures,
            error,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Provider for FlakyFacts {
    fn name(&self) -> &str {
        "flaky-facts"
    }
}

#[async_trait]
impl FactProvider for FlakyFacts {
    async fn fetch(&self) -> ProviderResult<Fact> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(self.error.clone());
        }
        Ok(Fact::new(OCTOPUS, "animals", "flaky-1"))
    }
}

/// Never answers within any reasonable budget.
pub struct StalledFacts;

#[async_trait]
impl Provider for StalledFacts {
    fn name(&self) -> &str {
        "stalled-facts"
    }
}

#[async_trait]
impl FactProvider for StalledFacts {
    async fn fetch(&self) -> ProviderResult<Fact> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Fact::new(OCTOPUS, "animals", "stalled-1"))
    }
}

/// Returns a fact and trips the job's cancel signal while doing so.
pub struct CancellingFacts {
    pub canceller: JobCanceller,
}

#[async_trait]
impl Provider for CancellingFacts {
    fn name(&self) -> &str {
        "cancelling-facts"
    }
}

#[async_trait]
impl FactProvider for CancellingFacts {
    async fn fetch(&self) -> ProviderResult<Fact> {
        self.canceller.cancel();
        Ok(Fact::new(OCTOPUS, "animals", "cancel-1"))
    }
}

// ---------------------------------------------------------------------------
// Scripts and narration
// ---------------------------------------------------------------------------

pub struct TemplateScripts;

#[async_trait]
impl Provider for TemplateScripts {
    fn name(&self) -> &str {
        "template"
    }
}

#[async_trait]
impl ScriptProvider for TemplateScripts {
    async fn generate(&self, fact: &Fact) -> ProviderResult<Script> {
        Ok(Script::from_fact(fact))
    }
}

/// Writes a placeholder audio file and reports evenly spaced word timings.
pub struct FakeNarrator {
    /// Drop the last timestamp to simulate a misaligned provider.
    pub drop_last_word: bool,
}

#[async_trait]
impl Provider for FakeNarrator {
    fn name(&self) -> &str {
        "fake-tts"
    }
}

#[async_trait]
impl NarrationProvider for FakeNarrator {
    async fn synthesize(&self, script: &Script, out_dir: &Path) -> ProviderResult<NarrationResult> {
        let text = script.narration_text();
        let duration = text.split_whitespace().count() as f64 * WORD_SECS;
        let audio_ref = out_dir.join("narration.wav");
        tokio::fs::write(&audio_ref, b"RIFF")
            .await
            .map_err(|e| ProviderError::transient(e.to_string()))?;

        let mut word_timestamps = interpolate_word_timestamps(text, duration);
        if self.drop_last_word {
            word_timestamps.pop();
        }
        Ok(NarrationResult {
            audio_ref,
            sample_rate: 22_050,
            duration_seconds: duration,
            word_timestamps,
        })
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

pub fn candidate(provider: &str, id: &str, title: &str, tags: &[&str]) -> VideoCandidate {
    VideoCandidate {
        id: id.into(),
        provider: provider.into(),
        title: title.into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        duration: 20.0,
        resolution: Some(Resolution::new(1920, 1080)),
        download_url: format!("https://media.invalid/{id}.mp4"),
    }
}

pub struct FakeVideos {
    pub name: String,
    pub search_result: ProviderResult<Vec<VideoCandidate>>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeVideos {
    pub fn with(name: &str, candidates: Vec<VideoCandidate>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            search_result: Ok(candidates),
            downloads: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str, error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            search_result: Err(error),
            downloads: Mutex::new(Vec::new()),
        })
    }

    pub fn downloaded(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for FakeVideos {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl VideoAssetProvider for FakeVideos {
    async fn search(&self, _keywords: &[String]) -> ProviderResult<Vec<VideoCandidate>> {
        self.search_result.clone()
    }

    async fn download(&self, candidate: &VideoCandidate, out_dir: &Path) -> ProviderResult<PathBuf> {
        let path = out_dir.join(format!("{}_{}.mp4", self.name, candidate.id));
        tokio::fs::write(&path, b"video")
            .await
            .map_err(|e| ProviderError::transient(e.to_string()))?;
        self.downloads.lock().unwrap().push(candidate.id.clone());
        Ok(path)
    }
}

pub struct FakeMusic {
    pub tracks: Vec<MusicAsset>,
}

#[async_trait]
impl Provider for FakeMusic {
    fn name(&self) -> &str {
        "local-music"
    }
}

#[async_trait]
impl MusicAssetProvider for FakeMusic {
    async fn list(&self) -> ProviderResult<Vec<MusicAsset>> {
        Ok(self.tracks.clone())
    }
}

// ---------------------------------------------------------------------------
// Render and publish
// ---------------------------------------------------------------------------

pub enum RenderBehaviour {
    WriteFile,
    SkipFile,
    Exit(i32),
}

pub struct FakeRenderer {
    pub behaviour: RenderBehaviour,
    pub plans: Mutex<Vec<AssemblyPlan>>,
}

impl FakeRenderer {
    pub fn new(behaviour: RenderBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            plans: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.plans.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for FakeRenderer {
    fn name(&self) -> &str {
        "fake-ffmpeg"
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, plan: &AssemblyPlan) -> ProviderResult<PathBuf> {
        self.plans.lock().unwrap().push(plan.clone());
        match self.behaviour {
            RenderBehaviour::WriteFile => {
                tokio::fs::write(&plan.output_path, b"mp4-bytes")
                    .await
                    .map_err(|e| ProviderError::permanent(e.to_string()))?;
                Ok(plan.output_path.clone())
            }
            RenderBehaviour::SkipFile => Ok(plan.output_path.clone()),
            RenderBehaviour::Exit(code) => Err(ProviderError::RenderFailed {
                exit_code: Some(code),
                stderr: "Invalid data found when processing input".into(),
            }),
        }
    }
}

pub struct FakePublisher {
    pub result: ProviderResult<String>,
}

#[async_trait]
impl Provider for FakePublisher {
    fn name(&self) -> &str {
        "fake-upload"
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn upload(&self, video: &Path, _script: &Script) -> ProviderResult<String> {
        if !video.exists() {
            return Err(ProviderError::permanent("video missing"));
        }
        self.result.clone()
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// A provider set where every stage succeeds with one octopus clip.
pub struct Kit {
    pub providers: Providers,
    pub videos: Arc<FakeVideos>,
    pub renderer: Arc<FakeRenderer>,
}

pub fn happy_kit() -> Kit {
    let videos = FakeVideos::with(
        "pexels",
        vec![
            candidate("pexels", "city-1", "City traffic at night", &["city", "cars"]),
            candidate(
                "pexels",
                "octo-1",
                "Octopus swimming over coral",
                &["octopus", "ocean", "blue"],
            ),
        ],
    );
    let renderer = FakeRenderer::new(RenderBehaviour::WriteFile);
    let providers = Providers {
        facts: vec![StaticFacts::new("static", OCTOPUS)],
        scripts: vec![Arc::new(TemplateScripts)],
        narrators: vec![Arc::new(FakeNarrator {
            drop_last_word: false,
        })],
        videos: vec![videos.clone()],
        music: Vec::new(),
        renderers: vec![renderer.clone()],
        publishers: Vec::new(),
    };
    Kit {
        providers,
        videos,
        renderer,
    }
}
