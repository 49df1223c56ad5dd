//! Pipeline jobs and their stage machine.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::SelectedAssets;
use super::caption::CaptionEvent;
use super::error::{ErrorKind, PipelineError};
use super::fact::Fact;
use super::narration::NarrationResult;
use super::script::Script;
use crate::planner::AssemblyPlan;

/// Identifier of a pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    FetchFact,
    GenerateScript,
    Narrate,
    BuildCaptions,
    SelectAssets,
    PlanAssembly,
    Render,
    Publish,
}

impl Stage {
    /// Every stage, in the only order they may run.
    pub const ORDER: [Stage; 8] = [
        Stage::FetchFact,
        Stage::GenerateScript,
        Stage::Narrate,
        Stage::BuildCaptions,
        Stage::SelectAssets,
        Stage::PlanAssembly,
        Stage::Render,
        Stage::Publish,
    ];

    pub fn next(self) -> Option<Stage> {
        let idx = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FetchFact => "FETCH_FACT",
            Stage::GenerateScript => "GENERATE_SCRIPT",
            Stage::Narrate => "NARRATE",
            Stage::BuildCaptions => "BUILD_CAPTIONS",
            Stage::SelectAssets => "SELECT_ASSETS",
            Stage::PlanAssembly => "PLAN_ASSEMBLY",
            Stage::Render => "RENDER",
            Stage::Publish => "PUBLISH",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }
}

/// Everything a job has produced so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobArtifacts {
    pub fact: Option<Fact>,
    pub script: Option<Script>,
    pub narration: Option<NarrationResult>,
    pub captions: Option<Vec<CaptionEvent>>,
    pub assets: Option<SelectedAssets>,
    pub plan: Option<AssemblyPlan>,
    pub output: Option<PathBuf>,
    pub remote_id: Option<String>,
}

/// A classified error recorded against a stage attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobErrorRecord {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub attempt: u32,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// One end-to-end run of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineJob {
    pub id: JobId,
    /// Stage currently (or most recently) executing.
    pub stage: Option<Stage>,
    pub status: JobStatus,
    pub attempts_per_stage: BTreeMap<Stage, u32>,
    pub artifacts: JobArtifacts,
    pub errors: Vec<JobErrorRecord>,
    /// Publish failures do not fail the job; they are surfaced here instead.
    pub publish_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineJob {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            stage: None,
            status: JobStatus::Pending,
            attempts_per_stage: BTreeMap::new(),
            artifacts: JobArtifacts::default(),
            errors: Vec::new(),
            publish_error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn attempts(&self, stage: Stage) -> u32 {
        self.attempts_per_stage.get(&stage).copied().unwrap_or(0)
    }

    /// The rendered file, only once the job has succeeded.
    pub fn output(&self) -> Option<&Path> {
        match self.status {
            JobStatus::Succeeded => self.artifacts.output.as_deref(),
            _ => None,
        }
    }

    /// The last stage whose artifact is present.
    pub fn last_completed_stage(&self) -> Option<Stage> {
        let a = &self.artifacts;
        let done = [
            (Stage::FetchFact, a.fact.is_some()),
            (Stage::GenerateScript, a.script.is_some()),
            (Stage::Narrate, a.narration.is_some()),
            (Stage::BuildCaptions, a.captions.is_some()),
            (Stage::SelectAssets, a.assets.is_some()),
            (Stage::PlanAssembly, a.plan.is_some()),
            (Stage::Render, a.output.is_some()),
            (Stage::Publish, a.remote_id.is_some()),
        ];
        done.iter()
            .take_while(|(_, present)| *present)
            .last()
            .map(|(stage, _)| *stage)
    }

    /// The error that ended a failed or aborted job.
    pub fn terminal_error(&self) -> Option<&JobErrorRecord> {
        match self.status {
            JobStatus::Failed | JobStatus::Aborted => self.errors.last(),
            _ => None,
        }
    }

    pub(crate) fn start(&mut self) {
        self.status = JobStatus::Running;
    }

    pub(crate) fn enter_stage(&mut self, stage: Stage) -> u32 {
        self.stage = Some(stage);
        let attempts = self.attempts_per_stage.entry(stage).or_insert(0);
        *attempts += 1;
        *attempts
    }

    pub(crate) fn record_error(&mut self, stage: Stage, attempt: u32, err: &PipelineError) {
        self.errors.push(JobErrorRecord {
            stage,
            kind: err.kind(),
            attempt,
            message: err.to_string(),
            at: Utc::now(),
        });
    }

    pub(crate) fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}
