//! In-memory target platform for testing.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use meridian_nuvla::{Application, DeploymentState};

use crate::error::{DeployerError, DeployerResult};
use crate::targets::NativeTarget;
use crate::types::{CredentialId, DeploymentId};

use super::TargetPlatform;

/// A launch recorded by [`MemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedDeployment {
    /// Assigned deployment ID.
    pub id: DeploymentId,
    /// Application the deployment was created from.
    pub application: Application,
    /// Credential the deployment was bound to.
    pub credential: CredentialId,
}

#[derive(Debug, Default)]
struct Topology {
    target_groups: HashMap<String, String>,
    services: Vec<(String, String, String)>,
    credentials: Vec<(String, CredentialId)>,
    failing_credentials: HashSet<CredentialId>,
    unavailable: bool,
}

#[derive(Debug, Default)]
struct Deployments {
    applications: HashMap<String, Application>,
    launched: Vec<LaunchedDeployment>,
    states: HashMap<DeploymentId, DeploymentState>,
}

/// In-memory target platform for testing.
///
/// The topology (targets, groups, infrastructure services, credentials) is
/// declared with the builder methods; launches are recorded and every
/// deployment reports [`DeploymentState::Started`] unless overridden.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    topology: RwLock<Topology>,
    deployments: RwLock<Deployments>,
}

fn poisoned<T>(_: T) -> DeployerError {
    DeployerError::internal("lock poisoned")
}

impl MemoryPlatform {
    /// Create a new empty platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn topology_mut(&self, f: impl FnOnce(&mut Topology)) {
        if let Ok(mut topology) = self.topology.write() {
            f(&mut topology);
        }
    }

    /// Declare that the resource `target` belongs to `group`.
    #[must_use]
    pub fn with_target(self, target: &str, group: &str) -> Self {
        self.topology_mut(|t| {
            t.target_groups.insert(target.to_owned(), group.to_owned());
        });
        self
    }

    /// Declare an infrastructure service of `subtype` under `group`.
    #[must_use]
    pub fn with_service(self, group: &str, service: &str, subtype: &str) -> Self {
        self.topology_mut(|t| {
            t.services
                .push((group.to_owned(), service.to_owned(), subtype.to_owned()));
        });
        self
    }

    /// Declare a credential under an infrastructure service.
    #[must_use]
    pub fn with_credential(self, service: &str, credential: &str) -> Self {
        self.topology_mut(|t| {
            t.credentials
                .push((service.to_owned(), CredentialId::new(credential)));
        });
        self
    }

    /// Make every launch bound to `credential` fail.
    #[must_use]
    pub fn fail_launches_on(self, credential: &str) -> Self {
        self.topology_mut(|t| {
            t.failing_credentials.insert(CredentialId::new(credential));
        });
        self
    }

    /// Make every call fail as if the platform were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.topology_mut(|t| t.unavailable = unavailable);
    }

    /// Override the state a deployment reports.
    pub fn set_state(&self, id: &DeploymentId, state: DeploymentState) {
        if let Ok(mut deployments) = self.deployments.write() {
            deployments.states.insert(id.clone(), state);
        }
    }

    /// Every successful launch, in order.
    #[must_use]
    pub fn launches(&self) -> Vec<LaunchedDeployment> {
        self.deployments
            .read()
            .map(|d| d.launched.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> DeployerResult<()> {
        if self.topology.read().map_err(poisoned)?.unavailable {
            return Err(DeployerError::platform("platform unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl TargetPlatform for MemoryPlatform {
    async fn owning_group(&self, target: &NativeTarget) -> DeployerResult<Option<String>> {
        self.check_available()?;
        let topology = self.topology.read().map_err(poisoned)?;
        Ok(topology.target_groups.get(target.cluster_name()).cloned())
    }

    async fn infrastructure_services(
        &self,
        group: &str,
        subtype: &str,
    ) -> DeployerResult<Vec<String>> {
        self.check_available()?;
        let topology = self.topology.read().map_err(poisoned)?;
        Ok(topology
            .services
            .iter()
            .filter(|(g, _, s)| g == group && s == subtype)
            .map(|(_, service, _)| service.clone())
            .collect())
    }

    async fn credentials(&self, infrastructure_service: &str) -> DeployerResult<Vec<CredentialId>> {
        self.check_available()?;
        let topology = self.topology.read().map_err(poisoned)?;
        Ok(topology
            .credentials
            .iter()
            .filter(|(service, _)| service == infrastructure_service)
            .map(|(_, credential)| credential.clone())
            .collect())
    }

    async fn create_application(&self, application: &Application) -> DeployerResult<String> {
        self.check_available()?;
        let mut deployments = self.deployments.write().map_err(poisoned)?;
        let id = format!("module/{}", application.path);
        deployments
            .applications
            .entry(id.clone())
            .or_insert_with(|| application.clone());
        Ok(id)
    }

    async fn launch(
        &self,
        application_id: &str,
        credential: &CredentialId,
    ) -> DeployerResult<DeploymentId> {
        self.check_available()?;
        if self
            .topology
            .read()
            .map_err(poisoned)?
            .failing_credentials
            .contains(credential)
        {
            return Err(DeployerError::platform(format!(
                "launch on {credential} refused"
            )));
        }

        let mut deployments = self.deployments.write().map_err(poisoned)?;
        let application = deployments
            .applications
            .get(application_id)
            .cloned()
            .ok_or_else(|| DeployerError::platform(format!("no application {application_id}")))?;

        let id = DeploymentId::new(format!("deployment/{}", deployments.launched.len() + 1));
        deployments.launched.push(LaunchedDeployment {
            id: id.clone(),
            application,
            credential: credential.clone(),
        });
        deployments
            .states
            .insert(id.clone(), DeploymentState::Started);
        Ok(id)
    }

    async fn deployment_state(&self, id: &DeploymentId) -> DeployerResult<DeploymentState> {
        self.check_available()?;
        let deployments = self.deployments.read().map_err(poisoned)?;
        deployments
            .states
            .get(id)
            .copied()
            .ok_or_else(|| DeployerError::platform(format!("no deployment {id}")))
    }

    async fn terminate(&self, id: &DeploymentId) -> DeployerResult<()> {
        self.check_available()?;
        let mut deployments = self.deployments.write().map_err(poisoned)?;
        match deployments.states.get_mut(id) {
            Some(state) => {
                *state = DeploymentState::Stopped;
                Ok(())
            }
            None => Err(DeployerError::platform(format!("no deployment {id}"))),
        }
    }
}
