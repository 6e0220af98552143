//! One reconciliation pass over the pending jobs.

mod lock;

pub use lock::{GroupLock, LockReport};

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::credentials::CredentialResolver;
use crate::jobs::JobSource;
use crate::launcher::Launcher;
use crate::merge::{merge_jobs, MergedGroup};
use crate::targets::native_targets;
use crate::types::{CredentialId, DeploymentRecord, RawJob};

/// Turns pending jobs into launched deployments.
///
/// A pass merges the jobs of each group, resolves the group's targets to
/// credentials and launches the merged manifest once per resolved target.
/// Around every launch the group's jobs are locked, then committed on
/// success or rolled back on failure. Failures are logged and contained:
/// one target never aborts its siblings or other groups.
///
/// When a group fans out to several targets with different outcomes, each
/// target's commit or rollback overwrites the previous one, so the jobs end
/// in the state written by the last target processed.
pub struct DeploymentReconciler {
    jobs: Arc<dyn JobSource>,
    resolver: CredentialResolver,
    launcher: Launcher,
    orchestrator: String,
}

impl DeploymentReconciler {
    /// Create a reconciler handling jobs tagged with `orchestrator`.
    pub fn new(
        jobs: Arc<dyn JobSource>,
        resolver: CredentialResolver,
        launcher: Launcher,
        orchestrator: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            resolver,
            launcher,
            orchestrator: orchestrator.into(),
        }
    }

    /// The job source this reconciler reads from.
    #[must_use]
    pub fn jobs(&self) -> &Arc<dyn JobSource> {
        &self.jobs
    }

    /// The launcher used for deployments.
    #[must_use]
    pub const fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    /// Fetch pending jobs and run a pass over them.
    pub async fn reconcile_once(&self) -> Vec<DeploymentRecord> {
        let jobs = self.jobs.fetch_pending().await;
        self.run_pass(jobs).await
    }

    /// Run one pass over `jobs`, returning the deployments launched.
    pub async fn run_pass(&self, jobs: Vec<RawJob>) -> Vec<DeploymentRecord> {
        let total = jobs.len();
        let owned: Vec<RawJob> = jobs
            .into_iter()
            .filter(|job| self.owns(job))
            .collect();

        debug!(total, owned = owned.len(), "filtered jobs");

        let mut records = Vec::new();
        for group in merge_jobs(&owned).into_values() {
            self.reconcile_group(&group, &mut records).await;
        }
        records
    }

    fn owns(&self, job: &RawJob) -> bool {
        job.orchestrator == self.orchestrator && !native_targets(&job.targets).is_empty()
    }

    async fn reconcile_group(&self, group: &MergedGroup, records: &mut Vec<DeploymentRecord>) {
        let resolved = match self.resolver.resolve(&group.targets).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(group_id = %group.group_id, error = %e, "failed resolving credentials");
                return;
            }
        };

        if resolved.is_empty() {
            info!(group_id = %group.group_id, "no target resolved, leaving jobs for the next pass");
            return;
        }

        if resolved.len() < group.targets.len() {
            let skipped: Vec<_> = group
                .targets
                .iter()
                .map(|t| t.cluster_name())
                .filter(|name| !resolved.contains_key(*name))
                .collect();
            warn!(group_id = %group.group_id, skipped = ?skipped, "some targets were not resolved");
        }

        for (target, credential) in &resolved {
            if let Some(record) = self.launch_on(group, target, credential).await {
                records.push(record);
            }
        }
    }

    async fn launch_on(
        &self,
        group: &MergedGroup,
        target: &str,
        credential: &CredentialId,
    ) -> Option<DeploymentRecord> {
        let (lock, report) =
            GroupLock::acquire(Arc::clone(&self.jobs), &group.group_id, &group.job_ids).await;
        if !report.is_complete() {
            warn!(group_id = %group.group_id, cluster = target, "launching with a partially locked group");
        }

        match self
            .launcher
            .launch(&group.manifest, &group.group_name, credential)
            .await
        {
            Ok(deployment_id) => {
                info!(group_id = %group.group_id, cluster = target, deployment_id = %deployment_id, "launched app");
                lock.commit().await;
                Some(DeploymentRecord {
                    group_id: group.group_id.clone(),
                    target: target.to_owned(),
                    deployment_id,
                })
            }
            Err(e) => {
                error!(group_id = %group.group_id, cluster = target, error = %e, "failed launching deployment");
                lock.rollback().await;
                None
            }
        }
    }
}

impl std::fmt::Debug for DeploymentReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentReconciler")
            .field("resolver", &self.resolver)
            .field("launcher", &self.launcher)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ReconcilerConfig;
    use crate::jobs::MemoryJobSource;
    use crate::platform::{MemoryPlatform, TargetPlatform};
    use crate::types::{GroupId, JobId, LockState, TargetRef};

    fn job(id: &str, orchestrator: &str, targets: &[&str]) -> RawJob {
        RawJob {
            id: JobId::new(id),
            group_id: GroupId::new(id),
            group_name: id.to_owned(),
            orchestrator: orchestrator.to_owned(),
            manifest: "kind: Pod".to_owned(),
            targets: targets.iter().map(|t| TargetRef::cluster(*t)).collect(),
            lock_state: LockState::Created,
        }
    }

    fn reconciler(jobs: &Arc<MemoryJobSource>, platform: &Arc<MemoryPlatform>) -> DeploymentReconciler {
        let platform: Arc<dyn TargetPlatform> = Arc::clone(platform) as _;
        let config = ReconcilerConfig::default();
        DeploymentReconciler::new(
            Arc::clone(jobs) as _,
            CredentialResolver::new(Arc::clone(&platform), &config.infrastructure_subtype),
            Launcher::new(platform, &config),
            &config.orchestrator,
        )
    }

    fn platform() -> MemoryPlatform {
        MemoryPlatform::new()
            .with_target("nuvlabox/1", "isg/1")
            .with_service("isg/1", "infrastructure-service/1", "kubernetes")
            .with_credential("infrastructure-service/1", "credential/1")
    }

    #[tokio::test]
    async fn foreign_jobs_are_untouched() {
        let foreign = [
            job("other-orchestrator", "ocm", &["nuvlabox/1"]),
            job("no-native-target", "nuvla", &["foo", "bar"]),
        ];
        let jobs = Arc::new(MemoryJobSource::with_jobs(foreign.clone()));
        let platform = Arc::new(platform());

        let records = reconciler(&jobs, &platform).run_pass(foreign.to_vec()).await;

        assert!(records.is_empty());
        assert!(platform.launches().is_empty());
        assert!(jobs.transitions().is_empty());
    }

    #[tokio::test]
    async fn reconcile_once_reads_the_job_source() {
        let jobs = Arc::new(MemoryJobSource::with_jobs([job("a", "nuvla", &["nuvlabox/1"])]));
        let platform = Arc::new(platform());

        let records = reconciler(&jobs, &platform).reconcile_once().await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "nuvlabox/1");
        assert_eq!(jobs.state(&JobId::new("a")), Some(LockState::Completed));
        assert_eq!(
            jobs.transitions(),
            vec![
                (JobId::new("a"), LockState::Processing),
                (JobId::new("a"), LockState::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn resolution_failure_skips_group() {
        let jobs = Arc::new(MemoryJobSource::with_jobs([job("a", "nuvla", &["nuvlabox/1"])]));
        let platform = Arc::new(platform());
        platform.set_unavailable(true);

        let records = reconciler(&jobs, &platform).reconcile_once().await;

        assert!(records.is_empty());
        assert!(jobs.transitions().is_empty());
    }
}
