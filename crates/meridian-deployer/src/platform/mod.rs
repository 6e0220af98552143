//! Target platform operations.
//!
//! The reconciler consumes the deployment platform through the
//! [`TargetPlatform`] trait: credential lookup primitives for the resolver
//! and the artifact/deployment lifecycle for the launcher.

mod memory;
mod nuvla;

pub use memory::{LaunchedDeployment, MemoryPlatform};
pub use nuvla::NuvlaPlatform;

use async_trait::async_trait;
use meridian_nuvla::{Application, DeploymentState};

use crate::error::DeployerResult;
use crate::targets::NativeTarget;
use crate::types::{CredentialId, DeploymentId};

/// Remote deployment platform.
///
/// Lookups report absence as `Ok(None)` or an empty list; only transport,
/// authentication and server failures are errors.
#[async_trait]
pub trait TargetPlatform: Send + Sync {
    /// Infrastructure-service group that owns `target`, if the target exists
    /// and names one.
    async fn owning_group(&self, target: &NativeTarget) -> DeployerResult<Option<String>>;

    /// Infrastructure services of `subtype` parented under `group`, in the
    /// platform's order.
    async fn infrastructure_services(&self, group: &str, subtype: &str)
        -> DeployerResult<Vec<String>>;

    /// Credentials parented under an infrastructure service.
    async fn credentials(&self, infrastructure_service: &str) -> DeployerResult<Vec<CredentialId>>;

    /// Create an application artifact, or reuse the one already registered
    /// under the same path. Returns the artifact ID.
    async fn create_application(&self, application: &Application) -> DeployerResult<String>;

    /// Launch a deployment of `application_id` bound to `credential`.
    async fn launch(
        &self,
        application_id: &str,
        credential: &CredentialId,
    ) -> DeployerResult<DeploymentId>;

    /// Current lifecycle state of a deployment.
    async fn deployment_state(&self, id: &DeploymentId) -> DeployerResult<DeploymentState>;

    /// Stop a deployment.
    async fn terminate(&self, id: &DeploymentId) -> DeployerResult<()>;
}
