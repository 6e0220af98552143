//! Nuvla-backed target platform.

use async_trait::async_trait;
use meridian_nuvla::{Application, DeploymentState, NuvlaClient, NuvlaConfig, NuvlaError, ResourceKind};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{DeployerError, DeployerResult};
use crate::targets::NativeTarget;
use crate::types::{CredentialId, DeploymentId};

use super::TargetPlatform;

/// Target platform backed by a logged-in Nuvla session.
#[derive(Debug, Clone)]
pub struct NuvlaPlatform {
    client: NuvlaClient,
}

impl NuvlaPlatform {
    /// Wrap an already authenticated client.
    #[must_use]
    pub const fn new(client: NuvlaClient) -> Self {
        Self { client }
    }

    /// Build a client from configuration and log in with the API key.
    pub async fn connect(config: &NuvlaConfig) -> DeployerResult<Self> {
        if config.api_secret.expose_secret().is_empty() {
            return Err(DeployerError::Config("nuvla.api_secret is empty".into()));
        }

        let client = NuvlaClient::new(config)?;
        let session = client.login_apikey(&config.api_key, &config.api_secret).await?;
        info!(endpoint = %client.endpoint(), session = %session, "logged in to Nuvla");

        Ok(Self::new(client))
    }

    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &NuvlaClient {
        &self.client
    }
}

#[async_trait]
impl TargetPlatform for NuvlaPlatform {
    async fn owning_group(&self, target: &NativeTarget) -> DeployerResult<Option<String>> {
        let attribute = target.kind().group_attribute();

        let resource = match self.client.get(target.cluster_name(), &[attribute]).await {
            Ok(resource) => resource,
            Err(NuvlaError::NotFound(_)) => {
                debug!(cluster = %target.cluster_name(), "target not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(resource
            .get(attribute)
            .and_then(Value::as_str)
            .filter(|group| !group.is_empty())
            .map(ToOwned::to_owned))
    }

    async fn infrastructure_services(
        &self,
        group: &str,
        subtype: &str,
    ) -> DeployerResult<Vec<String>> {
        let filter = format!(r#"parent="{group}" and subtype="{subtype}""#);
        Ok(self
            .client
            .search_ids(ResourceKind::InfrastructureService, filter)
            .await?)
    }

    async fn credentials(&self, infrastructure_service: &str) -> DeployerResult<Vec<CredentialId>> {
        let filter = format!(r#"parent="{infrastructure_service}""#);
        let ids = self
            .client
            .search_ids(ResourceKind::Credential, filter)
            .await?;
        Ok(ids.into_iter().map(CredentialId::new).collect())
    }

    async fn create_application(&self, application: &Application) -> DeployerResult<String> {
        Ok(self.client.create_module(application, true).await?)
    }

    async fn launch(
        &self,
        application_id: &str,
        credential: &CredentialId,
    ) -> DeployerResult<DeploymentId> {
        let id = self
            .client
            .launch_deployment(application_id, credential.as_str())
            .await?;
        Ok(DeploymentId::new(id))
    }

    async fn deployment_state(&self, id: &DeploymentId) -> DeployerResult<DeploymentState> {
        Ok(self.client.deployment_state(id.as_str()).await?)
    }

    async fn terminate(&self, id: &DeploymentId) -> DeployerResult<()> {
        Ok(self.client.stop_deployment(id.as_str()).await?)
    }
}
