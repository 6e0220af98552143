//! Common test utilities for deployer integration tests.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use meridian_deployer::config::ReconcilerConfig;
use meridian_deployer::{
    CredentialResolver, DeploymentReconciler, JobId, Launcher, LockState, MemoryJobSource,
    MemoryPlatform, RawJob, TargetPlatform,
};

/// Reconciler wired to in-memory collaborators.
pub struct TestDeployer {
    pub jobs: Arc<MemoryJobSource>,
    pub platform: Arc<MemoryPlatform>,
    pub reconciler: DeploymentReconciler,
}

impl TestDeployer {
    /// Wire a reconciler over `platform` with `jobs` pending.
    pub fn new(platform: MemoryPlatform, jobs: impl IntoIterator<Item = RawJob>) -> Self {
        let config = ReconcilerConfig::default();
        let jobs = Arc::new(MemoryJobSource::with_jobs(jobs));
        let platform = Arc::new(platform);
        let target: Arc<dyn TargetPlatform> = Arc::clone(&platform) as _;

        let reconciler = DeploymentReconciler::new(
            Arc::clone(&jobs) as _,
            CredentialResolver::new(Arc::clone(&target), &config.infrastructure_subtype),
            Launcher::new(target, &config),
            &config.orchestrator,
        );

        Self {
            jobs,
            platform,
            reconciler,
        }
    }

    /// Current state of a job.
    pub fn state(&self, id: &str) -> Option<LockState> {
        self.jobs.state(&JobId::new(id))
    }

    /// Transitions applied to one job, in order.
    pub fn transitions_of(&self, id: &str) -> Vec<LockState> {
        let id = JobId::new(id);
        self.jobs
            .transitions()
            .into_iter()
            .filter(|(job, _)| *job == id)
            .map(|(_, state)| state)
            .collect()
    }
}
