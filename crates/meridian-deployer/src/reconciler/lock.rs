//! Two-phase lock over the jobs of a merged group.
//!
//! Locking is not transactional: each job is transitioned individually and
//! the job manager may accept some transitions and reject others. Every
//! phase therefore reports which jobs it reached. A process that dies
//! between [`GroupLock::acquire`] and the final phase leaves the
//! acknowledged jobs in `PROCESSING`; nothing here recovers them.

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::jobs::JobSource;
use crate::types::{GroupId, JobId, LockState};

/// Outcome of applying one lock state to a group's jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockReport {
    /// State that was requested.
    pub state: LockState,
    /// Jobs the job source accepted the transition for.
    pub acknowledged: Vec<JobId>,
    /// Jobs whose transition failed.
    pub unacknowledged: Vec<JobId>,
}

impl LockReport {
    /// Returns true if every job was transitioned.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unacknowledged.is_empty()
    }
}

/// Jobs of one group held in `PROCESSING` for a launch attempt.
///
/// Consumed by exactly one of [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
#[must_use = "a group lock must be committed or rolled back"]
pub struct GroupLock {
    source: Arc<dyn JobSource>,
    group_id: GroupId,
    job_ids: Vec<JobId>,
}

impl GroupLock {
    /// Lock every job of the group.
    ///
    /// The lock is returned even when some transitions failed; the report
    /// says which.
    pub async fn acquire(
        source: Arc<dyn JobSource>,
        group_id: &GroupId,
        job_ids: &IndexSet<JobId>,
    ) -> (Self, LockReport) {
        let lock = Self {
            source,
            group_id: group_id.clone(),
            job_ids: job_ids.iter().cloned().collect(),
        };
        let report = lock.apply(LockState::Processing).await;
        (lock, report)
    }

    /// Mark every job completed.
    pub async fn commit(self) -> LockReport {
        self.apply(LockState::Completed).await
    }

    /// Release every job back to `CREATED`.
    pub async fn rollback(self) -> LockReport {
        self.apply(LockState::Created).await
    }

    /// Group the lock belongs to.
    #[must_use]
    pub const fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    async fn apply(&self, state: LockState) -> LockReport {
        let mut report = LockReport {
            state,
            acknowledged: Vec::with_capacity(self.job_ids.len()),
            unacknowledged: Vec::new(),
        };

        for id in &self.job_ids {
            if self.source.transition(id, state).await {
                report.acknowledged.push(id.clone());
            } else {
                report.unacknowledged.push(id.clone());
            }
        }

        if report.is_complete() {
            debug!(group_id = %self.group_id, state = %state, jobs = report.acknowledged.len(), "group transitioned");
        } else {
            warn!(
                group_id = %self.group_id,
                state = %state,
                acknowledged = ?report.acknowledged,
                unacknowledged = ?report.unacknowledged,
                "group partially transitioned"
            );
        }

        report
    }
}

impl std::fmt::Debug for GroupLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupLock")
            .field("group_id", &self.group_id)
            .field("job_ids", &self.job_ids)
            .finish_non_exhaustive()
    }
}
