//! Meridian deployment reconciler.
//!
//! Polls a job manager for container-deployment jobs, merges jobs that
//! belong to the same group into one multi-document manifest, resolves each
//! deployment target to a platform credential and launches the merged
//! manifest once per resolved target.
//!
//! # Reconciliation pass
//!
//! ```text
//! JobSource::fetch_pending
//!        │
//!        ▼
//! filter (orchestrator tag, ≥1 native target)
//!        │
//!        ▼
//! merge_jobs ──▶ MergedGroup per group id (first-seen order)
//!        │
//!        ▼  for each group
//! CredentialResolver::resolve(targets) ──▶ empty? skip group
//!        │
//!        ▼  for each (target, credential)
//! GroupLock::acquire ──▶ Launcher::launch ──▶ commit (COMPLETED)
//!                                      └────▶ rollback (CREATED)
//! ```
//!
//! Every collaborator failure is logged and contained inside the pass; the
//! [`ReconcileService`] loop only paces passes.

#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod jobs;
pub mod launcher;
pub mod merge;
pub mod platform;
pub mod reconciler;
pub mod service;
pub mod targets;
pub mod types;

pub use auth::{ClientCredentialsIssuer, TokenIssuer, TokenSession};
pub use config::DeployerConfig;
pub use credentials::CredentialResolver;
pub use error::{DeployerError, DeployerResult};
pub use jobs::{JobManagerClient, JobSource, MemoryJobSource};
pub use launcher::Launcher;
pub use merge::{merge_jobs, MergedGroup, MANIFEST_SEPARATOR};
pub use platform::{MemoryPlatform, NuvlaPlatform, TargetPlatform};
pub use reconciler::{DeploymentReconciler, GroupLock, LockReport};
pub use service::{PassOutcome, ReconcileService};
pub use targets::{NativeKind, NativeTarget, Target};
pub use types::{CredentialId, DeploymentId, DeploymentRecord, GroupId, JobId, LockState, RawJob, TargetRef};
