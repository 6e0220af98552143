//! Job manager access.
//!
//! The job manager hands out container-deployment jobs and tracks each
//! job's lock state. [`JobSource`] is the seam the reconciler works
//! against; [`JobManagerClient`] talks to the real service and
//! [`MemoryJobSource`] backs tests.

mod client;
mod memory;

pub use client::JobManagerClient;
pub use memory::MemoryJobSource;

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{JobId, LockState, RawJob};

/// Attempts per logical job manager call: the first try, plus one retry
/// after re-authenticating.
pub const MAX_AUTH_ATTEMPTS: usize = 2;

/// Body of a job state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobUpdate {
    /// Job identifier.
    #[serde(rename = "ID")]
    pub id: JobId,
    /// The job manager keys updates by `uuid` as well.
    pub uuid: JobId,
    /// Whether the job is held by a reconciler.
    pub locker: bool,
    /// Target state.
    pub state: LockState,
}

impl JobUpdate {
    /// Build the update moving `id` to `state`.
    #[must_use]
    pub fn new(id: &JobId, state: LockState) -> Self {
        Self {
            id: id.clone(),
            uuid: id.clone(),
            locker: state.is_locked(),
            state,
        }
    }
}

/// Access to pending jobs and their lock state.
///
/// Implementations contain their own failures: a call that cannot be
/// completed is logged and reported as an empty result or `false`, never
/// propagated to the reconciler.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Jobs waiting to be deployed. Empty if the job manager is unreachable.
    async fn fetch_pending(&self) -> Vec<RawJob>;

    /// Move a job to `state`. Returns true if the job manager accepted it.
    async fn transition(&self, id: &JobId, state: LockState) -> bool;

    /// Remove a job. Returns true if the job manager accepted it.
    async fn delete(&self, id: &JobId) -> bool;

    /// Lock a job for processing.
    async fn lock(&self, id: &JobId) -> bool {
        self.transition(id, LockState::Processing).await
    }

    /// Release a job back to the queue.
    async fn unlock(&self, id: &JobId) -> bool {
        self.transition(id, LockState::Created).await
    }

    /// Mark a job as done.
    async fn mark_completed(&self, id: &JobId) -> bool {
        self.transition(id, LockState::Completed).await
    }

    /// Mark a job as deployed with problems.
    async fn mark_degraded(&self, id: &JobId) -> bool {
        self.transition(id, LockState::Degraded).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn update_wire_format() {
        let update = JobUpdate::new(&JobId::new("j1"), LockState::Processing);
        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"ID": "j1", "uuid": "j1", "locker": true, "state": 2})
        );
    }

    #[test]
    fn unlock_releases_locker() {
        let update = JobUpdate::new(&JobId::new("j1"), LockState::Created);
        assert!(!update.locker);
        assert_eq!(update.state.as_u8(), 1);
    }
}
