//! Job store: explicit, id-addressed storage for pipeline jobs.
//!
//! The orchestrator receives a store instead of reaching for a global
//! registry. A store also arbitrates single-job mutual exclusion through
//! [`JobStore::claim`] / [`JobStore::release`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{JobId, PipelineJob};

/// Errors raised by a [`JobStore`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job already exists: {0}")]
    AlreadyExists(JobId),

    #[error("job {id} is already being processed by {owner}")]
    Busy { id: JobId, owner: String },

    #[error("job {id} is not claimed by {owner}")]
    NotClaimed { id: JobId, owner: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage for job records plus per-job processing claims.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: PipelineJob) -> StoreResult<()>;

    fn get(&self, id: &JobId) -> StoreResult<PipelineJob>;

    /// Replace the stored record of an existing job.
    fn save(&self, job: &PipelineJob) -> StoreResult<()>;

    fn list(&self) -> StoreResult<Vec<JobId>>;

    /// Mark `id` as being processed by `owner`. Fails with
    /// [`StoreError::Busy`] while another owner holds the claim.
    fn claim(&self, id: &JobId, owner: &str) -> StoreResult<()>;

    fn release(&self, id: &JobId, owner: &str) -> StoreResult<()>;
}

/// A held claim that is released when dropped.
pub struct JobClaim<'a> {
    store: &'a dyn JobStore,
    id: JobId,
    owner: String,
}

impl<'a> JobClaim<'a> {
    pub fn acquire(store: &'a dyn JobStore, id: &JobId, owner: &str) -> StoreResult<Self> {
        store.claim(id, owner)?;
        Ok(Self {
            store,
            id: id.clone(),
            owner: owner.to_string(),
        })
    }
}

impl Drop for JobClaim<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.release(&self.id, &self.owner) {
            tracing::warn!(job_id = %self.id, error = %e, "failed to release job claim");
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, PipelineJob>,
    claims: HashMap<JobId, String>,
}

/// In-memory job store backed by a `HashMap<JobId, PipelineJob>`.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: PipelineJob) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        inner.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    fn get(&self, id: &JobId) -> StoreResult<PipelineJob> {
        self.lock()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn save(&self, job: &PipelineJob) -> StoreResult<()> {
        let mut inner = self.lock();
        let slot = inner
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| StoreError::NotFound(job.id.clone()))?;
        *slot = job.clone();
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<JobId>> {
        let mut ids: Vec<JobId> = self.lock().jobs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn claim(&self, id: &JobId, owner: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        if !inner.jobs.contains_key(id) {
            return Err(StoreError::NotFound(id.clone()));
        }
        if let Some(holder) = inner.claims.get(id) {
            return Err(StoreError::Busy {
                id: id.clone(),
                owner: holder.clone(),
            });
        }
        inner.claims.insert(id.clone(), owner.to_string());
        Ok(())
    }

    fn release(&self, id: &JobId, owner: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        match inner.claims.get(id) {
            Some(holder) if holder == owner => {
                inner.claims.remove(id);
                Ok(())
            }
            _ => Err(StoreError::NotClaimed {
                id: id.clone(),
                owner: owner.to_string(),
            }),
        }
    }
}
