//! In-memory job source for testing.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{error, warn};

use crate::types::{JobId, LockState, RawJob};

use super::JobSource;

#[derive(Debug, Default)]
struct Inner {
    jobs: IndexMap<JobId, RawJob>,
    history: Vec<(JobId, LockState)>,
    rejected: HashSet<JobId>,
    unavailable: bool,
}

/// In-memory job source for testing.
///
/// Holds jobs in insertion order and records every accepted transition.
/// Individual jobs can be configured to reject transitions, which
/// simulates a job manager that fails part-way through locking a group.
#[derive(Debug, Default)]
pub struct MemoryJobSource {
    inner: Mutex<Inner>,
}

impl MemoryJobSource {
    /// Create a new empty job source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job source holding `jobs`.
    #[must_use]
    pub fn with_jobs(jobs: impl IntoIterator<Item = RawJob>) -> Self {
        let source = Self::new();
        for job in jobs {
            source.insert(job);
        }
        source
    }

    fn inner(&self) -> Option<MutexGuard<'_, Inner>> {
        match self.inner.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                error!("job source lock poisoned");
                None
            }
        }
    }

    /// Add or replace a job.
    pub fn insert(&self, job: RawJob) {
        if let Some(mut inner) = self.inner() {
            inner.jobs.insert(job.id.clone(), job);
        }
    }

    /// Current lock state of a job.
    #[must_use]
    pub fn state(&self, id: &JobId) -> Option<LockState> {
        self.inner()?.jobs.get(id).map(|job| job.lock_state)
    }

    /// Every accepted transition, in the order applied.
    #[must_use]
    pub fn transitions(&self) -> Vec<(JobId, LockState)> {
        self.inner()
            .map(|inner| inner.history.clone())
            .unwrap_or_default()
    }

    /// Whether a job is still held.
    #[must_use]
    pub fn contains(&self, id: &JobId) -> bool {
        self.inner().is_some_and(|inner| inner.jobs.contains_key(id))
    }

    /// Make every transition of `id` fail from now on.
    pub fn reject_transitions(&self, id: &JobId) {
        if let Some(mut inner) = self.inner() {
            inner.rejected.insert(id.clone());
        }
    }

    /// Simulate an unreachable job manager.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Some(mut inner) = self.inner() {
            inner.unavailable = unavailable;
        }
    }
}

#[async_trait]
impl JobSource for MemoryJobSource {
    async fn fetch_pending(&self) -> Vec<RawJob> {
        let Some(inner) = self.inner() else {
            return Vec::new();
        };
        if inner.unavailable {
            warn!("job source unavailable");
            return Vec::new();
        }

        inner
            .jobs
            .values()
            .filter(|job| !job.lock_state.is_locked())
            .cloned()
            .collect()
    }

    async fn transition(&self, id: &JobId, state: LockState) -> bool {
        let Some(mut inner) = self.inner() else {
            return false;
        };
        if inner.unavailable || inner.rejected.contains(id) {
            warn!(job_id = %id, state = %state, "transition rejected");
            return false;
        }

        let Some(job) = inner.jobs.get_mut(id) else {
            warn!(job_id = %id, "transition of unknown job");
            return false;
        };
        job.lock_state = state;
        inner.history.push((id.clone(), state));
        true
    }

    async fn delete(&self, id: &JobId) -> bool {
        let Some(mut inner) = self.inner() else {
            return false;
        };
        inner.jobs.shift_remove(id).is_some()
    }
}
