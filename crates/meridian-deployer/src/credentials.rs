//! Resolution of deployment targets to platform credentials.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::error::DeployerResult;
use crate::platform::TargetPlatform;
use crate::targets::NativeTarget;
use crate::types::CredentialId;

/// Resolves native targets to the credential a deployment must be bound to.
///
/// For each target: read the infrastructure-service group that owns it,
/// take the first infrastructure service of the configured subtype under
/// that group, then the first credential under that service.
#[derive(Clone)]
pub struct CredentialResolver {
    platform: Arc<dyn TargetPlatform>,
    subtype: String,
}

impl CredentialResolver {
    /// Create a resolver looking for infrastructure services of `subtype`.
    pub fn new(platform: Arc<dyn TargetPlatform>, subtype: impl Into<String>) -> Self {
        Self {
            platform,
            subtype: subtype.into(),
        }
    }

    /// Resolve `targets` to credentials, keyed by cluster name.
    ///
    /// Duplicate cluster names are resolved once, in first-seen order.
    /// Resolution stops at the first target without a credential: the
    /// returned map then holds only the targets resolved before it, and
    /// callers detect the gap by comparing lengths. Platform failures are
    /// returned as errors.
    pub async fn resolve(
        &self,
        targets: &[NativeTarget],
    ) -> DeployerResult<IndexMap<String, CredentialId>> {
        let mut resolved = IndexMap::new();

        for target in targets {
            if resolved.contains_key(target.cluster_name()) {
                continue;
            }

            let Some(credential) = self.resolve_one(target).await? else {
                error!(
                    cluster = %target.cluster_name(),
                    "failed finding credentials for deployment target"
                );
                break;
            };

            debug!(cluster = %target.cluster_name(), credential = %credential, "target resolved");
            resolved.insert(target.cluster_name().to_owned(), credential);
        }

        Ok(resolved)
    }

    async fn resolve_one(&self, target: &NativeTarget) -> DeployerResult<Option<CredentialId>> {
        let Some(group) = self.platform.owning_group(target).await? else {
            debug!(cluster = %target.cluster_name(), "no owning infrastructure-service group");
            return Ok(None);
        };

        let services = self
            .platform
            .infrastructure_services(&group, &self.subtype)
            .await?;
        let Some(service) = services.first() else {
            debug!(group = %group, subtype = %self.subtype, "no infrastructure service");
            return Ok(None);
        };

        let credentials = self.platform.credentials(service).await?;
        Ok(credentials.into_iter().next())
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("subtype", &self.subtype)
            .finish_non_exhaustive()
    }
}
