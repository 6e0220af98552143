//! Resource collections and document shapes used by the client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource collections this client works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// An edge device.
    NuvlaBox,
    /// A group of infrastructure services (typically one per edge device).
    InfrastructureServiceGroup,
    /// A container orchestration endpoint (Kubernetes, Swarm, ...).
    InfrastructureService,
    /// Access credentials, parented under the resource they grant access to.
    Credential,
    /// An application definition.
    Module,
    /// A running (or stopped) instance of a module.
    Deployment,
}

impl ResourceKind {
    /// Collection name as used in resource IDs and URLs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NuvlaBox => "nuvlabox",
            Self::InfrastructureServiceGroup => "infrastructure-service-group",
            Self::InfrastructureService => "infrastructure-service",
            Self::Credential => "credential",
            Self::Module => "module",
            Self::Deployment => "deployment",
        }
    }

    /// Returns true if `resource_id` belongs to this collection.
    #[must_use]
    pub fn owns(&self, resource_id: &str) -> bool {
        resource_id
            .split_once('/')
            .is_some_and(|(collection, uuid)| collection == self.as_str() && !uuid.is_empty())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Infrastructure service subtype for Kubernetes endpoints.
pub const SUBTYPE_KUBERNETES: &str = "kubernetes";

/// Module subtype for Kubernetes applications.
pub const SUBTYPE_APPLICATION_KUBERNETES: &str = "application_kubernetes";

/// Lifecycle state of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    /// Created but never started.
    Created,
    /// Start job accepted, not yet running.
    Pending,
    /// Start in progress.
    Starting,
    /// Running.
    Started,
    /// Update in progress.
    Updating,
    /// Stop in progress.
    Stopping,
    /// Stopped.
    Stopped,
    /// Suspended by the platform.
    Suspended,
    /// The last operation failed.
    Error,
    /// A state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl DeploymentState {
    /// Returns true once a launch has settled, successfully or not.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Started | Self::Error)
    }
}

/// Content block of a Kubernetes application module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationContent {
    /// Author of this module version.
    pub author: String,
    /// Commit message of this module version.
    pub commit: String,
    /// Manifest text. Nuvla stores Kubernetes manifests under the same key as
    /// compose files.
    #[serde(rename = "docker-compose")]
    pub script: String,
}

/// A Kubernetes application module document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Application {
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Full module path, unique across the platform.
    pub path: String,
    /// Project path the module lives under.
    pub parent_path: String,
    /// Module subtype.
    pub subtype: String,
    /// Module content.
    pub content: ApplicationContent,
}

/// Builder for [`Application`].
#[derive(Debug, Clone, Default)]
pub struct ApplicationBuilder {
    name: String,
    description: Option<String>,
    author: String,
    parent_path: String,
    script: String,
}

impl ApplicationBuilder {
    /// Start building an application with the given display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description (defaults to the name).
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the author recorded in the module content.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the project path the module is created under.
    #[must_use]
    pub fn parent_path(mut self, parent_path: impl Into<String>) -> Self {
        self.parent_path = parent_path.into();
        self
    }

    /// Set the manifest text.
    #[must_use]
    pub fn script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    /// Build the module document.
    ///
    /// The module path is the parent path joined with the lowercased name,
    /// spaces replaced by dashes.
    #[must_use]
    pub fn build(self) -> Application {
        let slug = self.name.to_lowercase().replace(' ', "-");
        let parent_path = self.parent_path.trim_end_matches('/').to_owned();
        let path = if parent_path.is_empty() {
            slug
        } else {
            format!("{parent_path}/{slug}")
        };

        Application {
            description: self.description.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            path,
            parent_path,
            subtype: SUBTYPE_APPLICATION_KUBERNETES.to_owned(),
            content: ApplicationContent {
                author: self.author,
                commit: "initial".to_owned(),
                script: self.script,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resource_kind_owns_ids() {
        assert!(ResourceKind::NuvlaBox.owns("nuvlabox/1234"));
        assert!(!ResourceKind::NuvlaBox.owns("nuvlabox/"));
        assert!(!ResourceKind::NuvlaBox.owns("infrastructure-service/1234"));
        assert!(ResourceKind::InfrastructureService.owns("infrastructure-service/1234"));
        assert!(!ResourceKind::Credential.owns("credential"));
    }

    #[test]
    fn application_path_is_slugified() {
        let app = ApplicationBuilder::new("My App 1700000000")
            .author("group/icos")
            .parent_path("icos/deploymentmanagement/")
            .script("kind: Pod")
            .build();

        assert_eq!(app.path, "icos/deploymentmanagement/my-app-1700000000");
        assert_eq!(app.parent_path, "icos/deploymentmanagement");
        assert_eq!(app.description, "My App 1700000000");
        assert_eq!(app.subtype, "application_kubernetes");
        assert_eq!(app.content.script, "kind: Pod");
    }

    #[test]
    fn application_serialises_with_platform_keys() {
        let app = ApplicationBuilder::new("web")
            .parent_path("apps")
            .script("kind: Service")
            .build();
        let json = serde_json::to_value(&app).unwrap();

        assert_eq!(json["parent-path"], "apps");
        assert_eq!(json["content"]["docker-compose"], "kind: Service");
    }

    #[test]
    fn deployment_state_parsing() {
        let started: DeploymentState = serde_json::from_str(r#""STARTED""#).unwrap();
        assert_eq!(started, DeploymentState::Started);
        assert!(started.is_final());

        let error: DeploymentState = serde_json::from_str(r#""ERROR""#).unwrap();
        assert!(error.is_final());

        let starting: DeploymentState = serde_json::from_str(r#""STARTING""#).unwrap();
        assert!(!starting.is_final());

        let other: DeploymentState = serde_json::from_str(r#""FROBNICATING""#).unwrap();
        assert_eq!(other, DeploymentState::Unknown);
        assert!(!other.is_final());
    }
}
