//! Global atomic counters for pipeline observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a job finishes).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::JobStatus;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    provider_calls: AtomicU64,
    provider_fallbacks: AtomicU64,
    stage_retries: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_aborted: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            provider_calls: AtomicU64::new(0),
            provider_fallbacks: AtomicU64::new(0),
            stage_retries: AtomicU64::new(0),
            jobs_succeeded: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_aborted: AtomicU64::new(0),
        }
    }

    /// One call (including retries) made to any provider.
    pub fn inc_provider_calls(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "provider_calls", "counter incremented");
    }

    /// A chain gave up on one provider and moved to the next.
    pub fn inc_provider_fallbacks(&self) {
        self.provider_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "provider_fallbacks", "counter incremented");
    }

    pub fn inc_stage_retries(&self) {
        self.stage_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stage_retries", "counter incremented");
    }

    /// Count a job that reached `status`. Non-terminal statuses are ignored.
    pub fn record_job(&self, status: JobStatus) {
        let counter = match status {
            JobStatus::Succeeded => &self.jobs_succeeded,
            JobStatus::Failed => &self.jobs_failed,
            JobStatus::Aborted => &self.jobs_aborted,
            JobStatus::Pending | JobStatus::Running => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            provider_calls = self.provider_calls(),
            provider_fallbacks = self.provider_fallbacks(),
            stage_retries = self.stage_retries(),
            jobs_succeeded = self.jobs_succeeded(),
            jobs_failed = self.jobs_failed(),
            jobs_aborted = self.jobs_aborted(),
        );
    }

    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn provider_fallbacks(&self) -> u64 {
        self.provider_fallbacks.load(Ordering::Relaxed)
    }

    pub fn stage_retries(&self) -> u64 {
        self.stage_retries.load(Ordering::Relaxed)
    }

    pub fn jobs_succeeded(&self) -> u64 {
        self.jobs_succeeded.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    pub fn jobs_aborted(&self) -> u64 {
        self.jobs_aborted.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.provider_calls,
            &self.provider_fallbacks,
            &self.stage_retries,
            &self.jobs_succeeded,
            &self.jobs_failed,
            &self.jobs_aborted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
