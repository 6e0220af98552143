//! Builders for test jobs and platform topologies.

use meridian_deployer::{GroupId, JobId, LockState, MemoryPlatform, RawJob, TargetRef};

/// Builder for [`RawJob`] values.
pub struct JobBuilder {
    job: RawJob,
}

impl JobBuilder {
    /// Start a job with the given ID, in a group of its own.
    pub fn new(id: &str) -> Self {
        Self {
            job: RawJob {
                id: JobId::new(id),
                group_id: GroupId::new(id),
                group_name: id.to_owned(),
                orchestrator: "nuvla".to_owned(),
                manifest: format!("kind: Pod\nmetadata:\n  name: {id}"),
                targets: Vec::new(),
                lock_state: LockState::Created,
            },
        }
    }

    pub fn group(mut self, group_id: &str, group_name: &str) -> Self {
        self.job.group_id = GroupId::new(group_id);
        self.job.group_name = group_name.to_owned();
        self
    }

    pub fn orchestrator(mut self, orchestrator: &str) -> Self {
        self.job.orchestrator = orchestrator.to_owned();
        self
    }

    pub fn manifest(mut self, manifest: &str) -> Self {
        self.job.manifest = manifest.to_owned();
        self
    }

    pub fn target(mut self, cluster_name: &str) -> Self {
        self.job.targets.push(TargetRef::cluster(cluster_name));
        self
    }

    pub fn build(self) -> RawJob {
        self.job
    }
}

/// Platform with edge devices `nuvlabox/1` and `nuvlabox/2` and the
/// infrastructure service `infrastructure-service/3`, each resolving to
/// its own Kubernetes credential (`credential/1`, `credential/2`,
/// `credential/3`). `nuvlabox/1` and `nuvlabox/1b` share a group and thus
/// a credential.
pub fn topology() -> MemoryPlatform {
    MemoryPlatform::new()
        .with_target("nuvlabox/1", "infrastructure-service-group/1")
        .with_target("nuvlabox/1b", "infrastructure-service-group/1")
        .with_target("nuvlabox/2", "infrastructure-service-group/2")
        .with_target("infrastructure-service/3", "infrastructure-service-group/3")
        .with_service(
            "infrastructure-service-group/1",
            "infrastructure-service/k8s-1",
            "kubernetes",
        )
        .with_service(
            "infrastructure-service-group/2",
            "infrastructure-service/k8s-2",
            "kubernetes",
        )
        .with_service(
            "infrastructure-service-group/3",
            "infrastructure-service/k8s-3",
            "kubernetes",
        )
        .with_credential("infrastructure-service/k8s-1", "credential/1")
        .with_credential("infrastructure-service/k8s-2", "credential/2")
        .with_credential("infrastructure-service/k8s-3", "credential/3")
}
