//! Pipeline orchestrator: the stage machine that turns a fact into a video.
//!
//! Stages run strictly in [`Stage::ORDER`]. Each stage either stores its
//! artifact on the job and advances, or fails with a classified
//! [`PipelineError`]. Retryable failures re-run the same stage up to
//! `job.max_stage_attempts`; anything else ends the job. A wall-clock budget
//! aborts the job wherever it is, and an external cancel signal aborts it at
//! the next stage boundary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::captions::build_caption_timeline;
use crate::config::PipelineConfig;
use crate::domain::{
    Fact, JobId, JobStatus, MusicAsset, NarrationResult, PipelineError, PipelineJob,
    ProviderError, Result, Script, SelectedAssets, Stage, VisualAsset,
};
use crate::fallback::{FallbackError, ProviderChain};
use crate::keywords::extract_keywords;
use crate::metrics::METRICS;
use crate::obs;
use crate::planner::{AssemblyPlan, AssemblyPlanner};
use crate::providers::{
    FactProvider, MusicAssetProvider, NarrationProvider, Publisher, Renderer, ScriptProvider,
    VideoAssetProvider,
};
use crate::ranker::{pick_music, rank};
use crate::store::{JobClaim, JobStore};
use crate::timing::normalize_word_timestamps;
use crate::workspace::{write_json, JobWorkspace};

/// Capability implementations per stage, each list in fallback order.
#[derive(Default, Clone)]
pub struct Providers {
    pub facts: Vec<Arc<dyn FactProvider>>,
    pub scripts: Vec<Arc<dyn ScriptProvider>>,
    pub narrators: Vec<Arc<dyn NarrationProvider>>,
    pub videos: Vec<Arc<dyn VideoAssetProvider>>,
    pub music: Vec<Arc<dyn MusicAssetProvider>>,
    pub renderers: Vec<Arc<dyn Renderer>>,
    pub publishers: Vec<Arc<dyn Publisher>>,
}

struct Chains {
    facts: ProviderChain<dyn FactProvider>,
    scripts: ProviderChain<dyn ScriptProvider>,
    narrators: ProviderChain<dyn NarrationProvider>,
    videos: ProviderChain<dyn VideoAssetProvider>,
    music: ProviderChain<dyn MusicAssetProvider>,
    renderers: ProviderChain<dyn Renderer>,
    publishers: ProviderChain<dyn Publisher>,
}

/// Receiving side of a job's cancel signal.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Sending side of a job's cancel signal.
#[derive(Debug)]
pub struct JobCanceller(watch::Sender<bool>);

impl JobCanceller {
    /// Ask the job to stop at the next stage boundary.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Create a linked canceller/token pair.
pub fn cancellation() -> (JobCanceller, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (JobCanceller(tx), CancelToken(rx))
}

fn exhausted(stage: Stage, err: FallbackError) -> PipelineError {
    PipelineError::ProvidersExhausted {
        stage,
        retryable: err.any_transient(),
        detail: err.to_string(),
    }
}

fn require<T: Clone>(artifact: &Option<T>, stage: Stage) -> Result<T> {
    artifact
        .clone()
        .ok_or(PipelineError::MissingArtifact(stage))
}

/// Sequences the pipeline stages for jobs held in a [`JobStore`].
pub struct Orchestrator {
    config: PipelineConfig,
    chains: Chains,
    store: Arc<dyn JobStore>,
    planner: AssemblyPlanner,
    owner: String,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        providers: Providers,
        store: Arc<dyn JobStore>,
    ) -> Result<Self> {
        config.validate()?;
        let policy = config.retry.clone();
        let chains = Chains {
            facts: ProviderChain::new("facts", providers.facts, policy.clone()),
            scripts: ProviderChain::new("scripts", providers.scripts, policy.clone()),
            narrators: ProviderChain::new("narration", providers.narrators, policy.clone()),
            videos: ProviderChain::new("videos", providers.videos, policy.clone()),
            music: ProviderChain::new("music", providers.music, policy.clone()),
            renderers: ProviderChain::new("render", providers.renderers, policy.clone()),
            publishers: ProviderChain::new("publish", providers.publishers, policy),
        };
        let planner = AssemblyPlanner::new(
            config.output.clone(),
            config.mix.music_gain,
            config.subtitles.clone(),
        );
        Ok(Self {
            config,
            chains,
            store,
            planner,
            owner: format!("orchestrator-{}", Uuid::new_v4()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Create a pending job and its artifact directory.
    pub async fn submit(&self) -> Result<JobId> {
        let id = JobId::new();
        JobWorkspace::create(&self.config.job.storage_root, &id).await?;
        self.store.insert(PipelineJob::new(id.clone()))?;
        Ok(id)
    }

    /// Run a job to a terminal status. See [`Orchestrator::run_with_cancel`].
    pub async fn run(&self, id: &JobId) -> Result<PipelineJob> {
        self.run_with_cancel(id, CancelToken::never()).await
    }

    /// Run a job until it succeeds, fails or is aborted.
    ///
    /// Returns `Err` only when the job cannot be run at all (unknown id,
    /// claimed by another orchestrator, store failure). Pipeline failures are
    /// reported through the returned job's status and error list.
    pub async fn run_with_cancel(&self, id: &JobId, cancel: CancelToken) -> Result<PipelineJob> {
        let _claim = JobClaim::acquire(self.store.as_ref(), id, &self.owner)?;
        let job = self.store.get(id)?;
        if job.is_terminal() {
            return Ok(job);
        }
        self.run_claimed(job, &cancel)
            .instrument(obs::job_span(id.as_str()))
            .await
    }

    async fn run_claimed(&self, mut job: PipelineJob, cancel: &CancelToken) -> Result<PipelineJob> {
        let started = Instant::now();
        let id = job.id.clone();
        let ws = JobWorkspace::new(&self.config.job.storage_root, &id);
        obs::emit_job_started(id.as_str());
        job.start();
        self.store.save(&job)?;

        let budget = Duration::from_secs(self.config.job.budget_secs);
        let outcome = tokio::time::timeout(budget, self.drive(&mut job, &ws, cancel)).await;
        let status = match outcome {
            Ok(Ok(())) => JobStatus::Succeeded,
            Ok(Err(PipelineError::Aborted(_))) => JobStatus::Aborted,
            Ok(Err(_)) => JobStatus::Failed,
            Err(_elapsed) => {
                let stage = job.stage.unwrap_or(Stage::FetchFact);
                let attempt = job.attempts(stage);
                let err = PipelineError::Aborted(format!(
                    "job budget of {}s exceeded",
                    self.config.job.budget_secs
                ));
                obs::emit_stage_failed(id.as_str(), stage, attempt, err.kind(), &err);
                job.record_error(stage, attempt, &err);
                JobStatus::Aborted
            }
        };

        job.finish(status);
        self.store.save(&job)?;
        if let Err(e) = write_json(&ws.job_record_path(), &job).await {
            warn!(job_id = %id, error = %e, "failed to write job record");
        }

        METRICS.record_job(status);
        let output = job.output().map(|p| p.display().to_string());
        obs::emit_job_finished(
            id.as_str(),
            status,
            started.elapsed().as_millis() as u64,
            output.as_deref(),
        );
        METRICS.flush();
        Ok(job)
    }

    /// Submit a fresh job and run it.
    pub async fn run_new(&self) -> Result<PipelineJob> {
        let id = self.submit().await?;
        self.run(&id).await
    }

    async fn drive(
        &self,
        job: &mut PipelineJob,
        ws: &JobWorkspace,
        cancel: &CancelToken,
    ) -> Result<()> {
        for stage in Stage::ORDER {
            if stage == Stage::Publish && !self.config.publish.enabled {
                break;
            }
            if cancel.is_cancelled() {
                let err = PipelineError::Aborted(format!("cancelled before {stage}"));
                job.record_error(stage, job.attempts(stage), &err);
                return Err(err);
            }
            self.run_stage(job, ws, stage).await?;
            self.store.save(job)?;
        }
        Ok(())
    }

    async fn run_stage(&self, job: &mut PipelineJob, ws: &JobWorkspace, stage: Stage) -> Result<()> {
        loop {
            let attempt = job.enter_stage(stage);
            obs::emit_stage_started(job.id.as_str(), stage, attempt);
            let started = Instant::now();

            match self.execute_stage(job, ws, stage).await {
                Ok(()) => {
                    obs::emit_stage_completed(
                        job.id.as_str(),
                        stage,
                        started.elapsed().as_millis() as u64,
                    );
                    return Ok(());
                }
                Err(err) => {
                    obs::emit_stage_failed(job.id.as_str(), stage, attempt, err.kind(), &err);
                    job.record_error(stage, attempt, &err);
                    if err.is_retryable() && attempt < self.config.job.max_stage_attempts {
                        METRICS.inc_stage_retries();
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn execute_stage(
        &self,
        job: &mut PipelineJob,
        ws: &JobWorkspace,
        stage: Stage,
    ) -> Result<()> {
        match stage {
            Stage::FetchFact => {
                let fact = self.fetch_fact().await?;
                job.artifacts.fact = Some(fact);
            }
            Stage::GenerateScript => {
                let fact = require(&job.artifacts.fact, Stage::FetchFact)?;
                let limits = self.config.script;
                let fact = &fact;
                let got = self
                    .chains
                    .scripts
                    .execute(|p| async move {
                        let script = p.generate(fact).await?.validated(&limits)?;
                        Ok(script.with_category(&fact.category))
                    })
                    .await
                    .map_err(|e| exhausted(stage, e))?;
                job.artifacts.script = Some(got.value);
            }
            Stage::Narrate => {
                let script = require(&job.artifacts.script, Stage::GenerateScript)?;
                let narration = self.narrate(&script, ws).await?;
                job.artifacts.narration = Some(narration);
            }
            Stage::BuildCaptions => {
                let narration = require(&job.artifacts.narration, Stage::Narrate)?;
                let captions =
                    build_caption_timeline(&narration.word_timestamps, &self.config.captions);
                job.artifacts.captions = Some(captions);
            }
            Stage::SelectAssets => {
                let fact = require(&job.artifacts.fact, Stage::FetchFact)?;
                let narration = require(&job.artifacts.narration, Stage::Narrate)?;
                let assets = self.select_assets(&fact, &narration, ws).await?;
                job.artifacts.assets = Some(assets);
            }
            Stage::PlanAssembly => {
                let narration = require(&job.artifacts.narration, Stage::Narrate)?;
                let captions = require(&job.artifacts.captions, Stage::BuildCaptions)?;
                let assets = require(&job.artifacts.assets, Stage::SelectAssets)?;
                let plan = self.planner.plan(
                    &assets.video,
                    &narration,
                    assets.music.as_ref(),
                    &captions,
                    &ws.render_target(),
                );
                tokio::fs::write(&plan.subtitle_track.path, plan.subtitle_document()).await?;
                write_json(&ws.plan_path(), &plan).await?;
                job.artifacts.plan = Some(plan);
            }
            Stage::Render => {
                let plan = require(&job.artifacts.plan, Stage::PlanAssembly)?;
                let output = self.render(&plan).await?;
                job.artifacts.output = Some(output);
            }
            Stage::Publish => {
                let output = require(&job.artifacts.output, Stage::Render)?;
                let script = require(&job.artifacts.script, Stage::GenerateScript)?;
                match self.publish(&output, &script).await {
                    Ok(remote_id) => job.artifacts.remote_id = Some(remote_id),
                    Err(err) => {
                        obs::emit_publish_failed(job.id.as_str(), &err);
                        job.publish_error = Some(err.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    async fn fetch_fact(&self) -> Result<Fact> {
        let got = self
            .chains
            .facts
            .execute(|p| async move { p.fetch().await?.validated() })
            .await
            .map_err(|e| exhausted(Stage::FetchFact, e))?;
        Ok(got.value)
    }

    async fn narrate(&self, script: &Script, ws: &JobWorkspace) -> Result<NarrationResult> {
        let out_dir = ws.audio_dir();
        let out_dir = out_dir.as_path();
        let got = self
            .chains
            .narrators
            .execute(|p| async move { p.synthesize(script, out_dir).await })
            .await
            .map_err(|e| exhausted(Stage::Narrate, e))?;

        let raw = got.value;
        let words = normalize_word_timestamps(
            script.narration_text(),
            &raw.word_timestamps,
            raw.duration_seconds,
            self.config.timing.min_word_secs,
        )?;
        Ok(NarrationResult {
            word_timestamps: words,
            ..raw
        })
    }

    async fn select_assets(
        &self,
        fact: &Fact,
        narration: &NarrationResult,
        ws: &JobWorkspace,
    ) -> Result<SelectedAssets> {
        let cfg = &self.config.assets;
        let keywords = extract_keywords(&fact.text, cfg.max_keywords);
        let kw = keywords.as_slice();

        // Every provider is queried; results are pooled in provider order.
        let outcomes = self
            .chains
            .videos
            .gather(|p| async move { p.search(kw).await })
            .await;
        let mut pool = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(found) => pool.extend(found.value),
                Err(failure) => failures.push(failure),
            }
        }

        let ranked = rank(&pool, &keywords, &self.chains.videos.names(), cfg.min_video_secs);
        if ranked.is_empty() {
            let all_failed = !failures.is_empty() && failures.len() == self.chains.videos.len();
            if all_failed && failures.iter().any(|f| f.error.is_transient()) {
                return Err(exhausted(
                    Stage::SelectAssets,
                    FallbackError::Exhausted {
                        label: self.chains.videos.label().to_string(),
                        failures,
                    },
                ));
            }
            return Err(PipelineError::AssetUnavailable {
                keywords,
                detail: format!(
                    "{} candidate(s) pooled, none usable; {} provider(s) failed",
                    pool.len(),
                    failures.len()
                ),
            });
        }

        let names = self.chains.videos.names();
        let assets_dir = ws.assets_dir();
        let dir = assets_dir.as_path();
        let mut video: Option<VisualAsset> = None;
        let mut download_errors = Vec::new();
        for entry in ranked.iter().take(cfg.max_download_attempts) {
            let candidate = &entry.candidate;
            let Some(index) = names.iter().position(|n| *n == candidate.provider) else {
                download_errors.push(format!("{}: unknown provider {}", candidate.id, candidate.provider));
                continue;
            };
            match self
                .chains
                .videos
                .execute_on(index, |p| async move { p.download(candidate, dir).await })
                .await
            {
                Ok(done) => {
                    video = Some(VisualAsset::from_candidate(candidate, done.value, entry.score));
                    break;
                }
                Err(e) => {
                    warn!(candidate = %candidate.id, provider = %candidate.provider, error = %e, "video download failed");
                    download_errors.push(format!("{}: {e}", candidate.id));
                }
            }
        }
        let video = video.ok_or_else(|| PipelineError::AssetUnavailable {
            keywords: keywords.clone(),
            detail: format!("downloads failed: {}", download_errors.join("; ")),
        })?;

        let music = self.select_music(narration).await;
        Ok(SelectedAssets {
            keywords,
            video,
            music,
        })
    }

    /// Pick background music. Any failure just means no music.
    async fn select_music(&self, narration: &NarrationResult) -> Option<MusicAsset> {
        if self.chains.music.is_empty() {
            return None;
        }
        let tracks = match self.chains.music.execute(|p| async move { p.list().await }).await {
            Ok(listed) => listed.value,
            Err(e) => {
                warn!(error = %e, "music pool unavailable, continuing without music");
                return None;
            }
        };
        let wanted = narration
            .duration_seconds
            .min(self.config.output.max_duration_secs);
        let picked = pick_music(&tracks, wanted, &mut rand::thread_rng());
        if picked.is_none() {
            warn!("music pool is empty, continuing without music");
        }
        picked
    }

    async fn render(&self, plan: &AssemblyPlan) -> Result<PathBuf> {
        let output = match self
            .chains
            .renderers
            .execute(|p| async move { p.render(plan).await })
            .await
        {
            Ok(done) => done.value,
            Err(e) => {
                if let Some(ProviderError::RenderFailed { exit_code, stderr }) = e.last_error() {
                    return Err(PipelineError::Render {
                        exit_code: *exit_code,
                        stderr: stderr.clone(),
                    });
                }
                return Err(exhausted(Stage::Render, e));
            }
        };

        // Never report a missing or empty file as a finished render.
        match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => Ok(output),
            _ => Err(PipelineError::Render {
                exit_code: None,
                stderr: format!("renderer reported success but {} is missing or empty", output.display()),
            }),
        }
    }

    async fn publish(&self, video: &Path, script: &Script) -> Result<String> {
        if self.chains.publishers.is_empty() {
            return Err(PipelineError::Publish("no publishers configured".into()));
        }
        self.chains
            .publishers
            .execute(|p| async move { p.upload(video, script).await })
            .await
            .map(|done| done.value)
            .map_err(|e| PipelineError::Publish(e.to_string()))
    }
}
