//! Service lifecycle: the reconciliation loop and signal handling.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::auth::{ClientCredentialsIssuer, TokenSession};
use crate::config::{DeployerConfig, ReconcilerConfig};
use crate::credentials::CredentialResolver;
use crate::error::DeployerResult;
use crate::jobs::{JobManagerClient, JobSource};
use crate::launcher::Launcher;
use crate::platform::{NuvlaPlatform, TargetPlatform};
use crate::reconciler::DeploymentReconciler;
use crate::types::DeploymentRecord;

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The job source had nothing pending.
    Idle,
    /// At least one deployment was launched.
    Deployed(Vec<DeploymentRecord>),
    /// Jobs were pending but none could be launched.
    NothingDeployed,
}

/// The deployer service.
///
/// Runs reconciliation passes back to back, idling between them, until
/// cancelled. A pass in progress is never interrupted; cancellation is
/// observed between passes.
pub struct ReconcileService {
    reconciler: DeploymentReconciler,
    idle_interval: Duration,
    cancel: CancellationToken,
}

impl ReconcileService {
    /// Assemble a service from its collaborators.
    pub fn new(
        jobs: Arc<dyn JobSource>,
        platform: Arc<dyn TargetPlatform>,
        config: &ReconcilerConfig,
    ) -> Self {
        let resolver =
            CredentialResolver::new(Arc::clone(&platform), &config.infrastructure_subtype);
        let launcher = Launcher::new(platform, config);

        Self {
            reconciler: DeploymentReconciler::new(jobs, resolver, launcher, &config.orchestrator),
            idle_interval: config.idle_interval(),
            cancel: CancellationToken::new(),
        }
    }

    /// Build the production collaborators and log in to the platform.
    ///
    /// Fails if the platform login fails; the job manager is only contacted
    /// once the loop runs.
    pub async fn connect(config: &DeployerConfig) -> DeployerResult<Self> {
        let issuer = ClientCredentialsIssuer::new(&config.auth)?;
        let session = Arc::new(TokenSession::new(Arc::new(issuer)));
        let jobs = JobManagerClient::new(&config.job_manager, session)?;
        info!(url = %config.job_manager.url, "job manager client configured");

        let platform = NuvlaPlatform::connect(&config.nuvla).await?;

        Ok(Self::new(Arc::new(jobs), Arc::new(platform), &config.reconciler))
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request the loop to stop after the current pass.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// The reconciler driven by this service.
    #[must_use]
    pub const fn reconciler(&self) -> &DeploymentReconciler {
        &self.reconciler
    }

    /// Run one loop iteration: fetch, and reconcile if anything is pending.
    pub async fn tick(&self) -> PassOutcome {
        let jobs = self.reconciler.jobs().fetch_pending().await;
        if jobs.is_empty() {
            info!("no deployments received");
            return PassOutcome::Idle;
        }

        info!(jobs = jobs.len(), "deployments received");
        let records = self.reconciler.run_pass(jobs).await;

        if records.is_empty() {
            info!("nothing deployed");
            return PassOutcome::NothingDeployed;
        }

        for record in &records {
            info!(%record, "deployed");
        }
        PassOutcome::Deployed(records)
    }

    /// Run passes until cancelled.
    pub async fn run(&self) {
        info!(idle_secs = self.idle_interval.as_secs(), "reconcile loop started");

        while !self.cancel.is_cancelled() {
            self.tick().await;

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.idle_interval) => {}
            }
        }

        info!("reconcile loop stopped");
    }
}

impl std::fmt::Debug for ReconcileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileService")
            .field("reconciler", &self.reconciler)
            .field("idle_interval", &self.idle_interval)
            .finish_non_exhaustive()
    }
}

/// Wait for Ctrl+C or SIGTERM, then cancel `cancel`.
///
/// Returns early if `cancel` is cancelled by someone else.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("received SIGTERM, initiating shutdown");
        }
        () = cancel.cancelled() => {
            return;
        }
    }

    cancel.cancel();
}
