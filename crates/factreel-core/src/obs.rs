//! Structured observability hooks for pipeline job lifecycle events.
//!
//! This module provides:
//! - Job-scoped tracing spans via the `JobSpan` RAII guard
//! - Emission functions for job start/finish, stage enter/exit/failure and
//!   provider fallback
//!
//! Events are emitted at `info!` level (failures at `warn!`) and carry an
//! `event` field so JSON logs can be filtered by event name.

use tracing::{info, warn};

use crate::domain::{ErrorKind, JobStatus, Stage};

/// RAII guard that enters a job-scoped tracing span.
///
/// ```ignore
/// let _span = JobSpan::enter("job-123");
/// // every tracing call now carries job_id = "job-123"
/// ```
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    pub fn enter(job_id: &str) -> Self {
        let span = tracing::info_span!("factreel.job", job_id = %job_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Build (without entering) the span for a job, for use with `Instrument`.
pub fn job_span(job_id: &str) -> tracing::Span {
    tracing::info_span!("factreel.job", job_id = %job_id)
}

pub fn emit_job_started(job_id: &str) {
    info!(event = "job.started", job_id = %job_id);
}

/// Emit event: job reached a terminal status.
pub fn emit_job_finished(job_id: &str, status: JobStatus, duration_ms: u64, output: Option<&str>) {
    info!(
        event = "job.finished",
        job_id = %job_id,
        status = ?status,
        duration_ms = duration_ms,
        output = output.unwrap_or(""),
    );
}

pub fn emit_stage_started(job_id: &str, stage: Stage, attempt: u32) {
    info!(event = "stage.started", job_id = %job_id, stage = %stage, attempt = attempt);
}

pub fn emit_stage_completed(job_id: &str, stage: Stage, duration_ms: u64) {
    info!(
        event = "stage.completed",
        job_id = %job_id,
        stage = %stage,
        duration_ms = duration_ms,
    );
}

/// Emit event: stage attempt failed (warning level).
pub fn emit_stage_failed(
    job_id: &str,
    stage: Stage,
    attempt: u32,
    kind: ErrorKind,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "stage.failed",
        job_id = %job_id,
        stage = %stage,
        attempt = attempt,
        kind = ?kind,
        error = %error,
    );
}

/// Emit event: a provider was exhausted and the chain moved on.
pub fn emit_provider_fallback(
    chain: &str,
    provider: &str,
    attempts: u32,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "provider.fallback",
        chain = %chain,
        provider = %provider,
        attempts = attempts,
        error = %error,
    );
}

/// Emit event: publishing failed after a successful render.
pub fn emit_publish_failed(job_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "publish.failed", job_id = %job_id, error = %error);
}
