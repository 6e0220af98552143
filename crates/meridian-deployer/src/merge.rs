//! Grouping of jobs into merged multi-document manifests.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::targets::{native_targets, NativeTarget};
use crate::types::{GroupId, JobId, RawJob};

/// Separator placed between the manifests of a group's jobs.
pub const MANIFEST_SEPARATOR: &str = "\r\n---\r\n";

/// All jobs of one group folded into a single deployable unit.
///
/// The merged group has no job ID of its own; `job_ids` lists every job it
/// was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedGroup {
    /// Shared group identifier.
    pub group_id: GroupId,
    /// Constituent jobs, in first-seen order.
    pub job_ids: IndexSet<JobId>,
    /// Group label, taken from the first job.
    pub group_name: String,
    /// Orchestrator tag, taken from the first job.
    pub orchestrator: String,
    /// Constituent manifests joined by [`MANIFEST_SEPARATOR`].
    pub manifest: String,
    /// Union of the constituent jobs' native targets, in first-seen order.
    pub targets: Vec<NativeTarget>,
}

impl MergedGroup {
    fn from_first(job: &RawJob) -> Self {
        let mut job_ids = IndexSet::new();
        job_ids.insert(job.id.clone());

        let mut group = Self {
            group_id: job.group_id.clone(),
            job_ids,
            group_name: job.group_name.clone(),
            orchestrator: job.orchestrator.clone(),
            manifest: job.manifest.clone(),
            targets: Vec::new(),
        };
        group.add_targets(job);
        group
    }

    fn fold(&mut self, job: &RawJob) {
        if !self.job_ids.insert(job.id.clone()) {
            return;
        }
        self.manifest.push_str(MANIFEST_SEPARATOR);
        self.manifest.push_str(&job.manifest);
        self.add_targets(job);
    }

    fn add_targets(&mut self, job: &RawJob) {
        for target in native_targets(&job.targets) {
            if !self.targets.contains(&target) {
                self.targets.push(target);
            }
        }
    }
}

/// Group jobs by group ID and concatenate the manifests of each group.
///
/// Groups appear in the order their first job appears. A job whose ID was
/// already folded into its group is skipped, so duplicate delivery does not
/// change the result.
#[must_use]
pub fn merge_jobs(jobs: &[RawJob]) -> IndexMap<GroupId, MergedGroup> {
    let mut merged: IndexMap<GroupId, MergedGroup> = IndexMap::new();

    for job in jobs {
        match merged.get_mut(&job.group_id) {
            Some(group) => group.fold(job),
            None => {
                merged.insert(job.group_id.clone(), MergedGroup::from_first(job));
            }
        }
    }

    merged
}
