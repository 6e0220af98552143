//! Launch protocol: application artifact, then a deployment bound to a
//! credential.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use meridian_nuvla::{ApplicationBuilder, DeploymentState};
use tracing::{debug, info};

use crate::config::ReconcilerConfig;
use crate::error::DeployerResult;
use crate::platform::TargetPlatform;
use crate::types::{CredentialId, DeploymentId};

/// Launches merged manifests on the target platform.
#[derive(Clone)]
pub struct Launcher {
    platform: Arc<dyn TargetPlatform>,
    parent_path: String,
    author: String,
    poll_interval: Duration,
}

impl Launcher {
    /// Create a launcher from the reconciler configuration.
    pub fn new(platform: Arc<dyn TargetPlatform>, config: &ReconcilerConfig) -> Self {
        Self {
            platform,
            parent_path: config.application_parent_path.clone(),
            author: config.application_author.clone(),
            poll_interval: config.deployment_poll_interval(),
        }
    }

    /// Override the interval used by [`wait_in_final_state`](Self::wait_in_final_state).
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Launch `manifest` under `app_name`, bound to `credential`.
    ///
    /// The application is named `"{app_name} {unix seconds}"`, so repeated
    /// launches of the same group get distinct artifacts. An artifact that
    /// already exists under the same path is reused.
    pub async fn launch(
        &self,
        manifest: &str,
        app_name: &str,
        credential: &CredentialId,
    ) -> DeployerResult<DeploymentId> {
        let name = format!("{app_name} {}", Utc::now().timestamp());
        let application = ApplicationBuilder::new(&name)
            .author(&self.author)
            .parent_path(&self.parent_path)
            .script(manifest)
            .build();

        info!(path = %application.path, "creating application");
        let application_id = self.platform.create_application(&application).await?;
        info!(application_id = %application_id, "created application");

        let deployment_id = self.platform.launch(&application_id, credential).await?;
        info!(deployment_id = %deployment_id, credential = %credential, "launched deployment");

        Ok(deployment_id)
    }

    /// Poll a deployment until it is started or has failed.
    pub async fn wait_in_final_state(&self, id: &DeploymentId) -> DeployerResult<DeploymentState> {
        loop {
            let state = self.platform.deployment_state(id).await?;
            if state.is_final() {
                debug!(deployment_id = %id, state = ?state, "deployment settled");
                return Ok(state);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Stop a deployment.
    pub async fn terminate(&self, id: &DeploymentId) -> DeployerResult<()> {
        info!(deployment_id = %id, "terminating deployment");
        self.platform.terminate(id).await
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("parent_path", &self.parent_path)
            .field("author", &self.author)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::platform::MemoryPlatform;

    fn launcher(platform: &Arc<MemoryPlatform>) -> Launcher {
        let platform: Arc<dyn TargetPlatform> = Arc::clone(platform) as _;
        Launcher::new(platform, &ReconcilerConfig::default())
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn launch_builds_timestamped_application() {
        let platform = Arc::new(MemoryPlatform::new());
        let before = Utc::now().timestamp();

        let id = launcher(&platform)
            .launch("kind: Pod", "My App", &CredentialId::new("credential/1"))
            .await
            .unwrap();

        let launches = platform.launches();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].id, id);
        assert_eq!(launches[0].credential.as_str(), "credential/1");

        let app = &launches[0].application;
        let (name, stamp) = app.name.rsplit_once(' ').unwrap();
        assert_eq!(name, "My App");
        assert!(stamp.parse::<i64>().unwrap() >= before);
        assert_eq!(app.description, app.name);
        assert_eq!(app.content.script, "kind: Pod");
        assert_eq!(app.content.author, "group/icos");
        assert_eq!(app.parent_path, "icos/deploymentmanagement");
        assert_eq!(
            app.path,
            format!("icos/deploymentmanagement/my-app-{stamp}")
        );
    }

    #[tokio::test]
    async fn launch_failure_propagates() {
        let platform = Arc::new(MemoryPlatform::new().fail_launches_on("credential/bad"));

        let result = launcher(&platform)
            .launch("kind: Pod", "app", &CredentialId::new("credential/bad"))
            .await;

        assert!(result.is_err());
        assert!(platform.launches().is_empty());
    }

    #[tokio::test]
    async fn wait_returns_once_started() {
        let platform = Arc::new(MemoryPlatform::new());
        let launcher = launcher(&platform);
        let id = launcher
            .launch("kind: Pod", "app", &CredentialId::new("credential/1"))
            .await
            .unwrap();
        platform.set_state(&id, DeploymentState::Starting);

        let settle = {
            let platform = Arc::clone(&platform);
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                platform.set_state(&id, DeploymentState::Error);
            })
        };

        let state = launcher.wait_in_final_state(&id).await.unwrap();
        assert_eq!(state, DeploymentState::Error);
        settle.await.unwrap();
    }

    #[tokio::test]
    async fn terminate_stops_deployment() {
        let platform = Arc::new(MemoryPlatform::new());
        let launcher = launcher(&platform);
        let id = launcher
            .launch("kind: Pod", "app", &CredentialId::new("credential/1"))
            .await
            .unwrap();

        launcher.terminate(&id).await.unwrap();

        let platform: Arc<dyn TargetPlatform> = platform;
        assert_eq!(
            platform.deployment_state(&id).await.unwrap(),
            DeploymentState::Stopped
        );
    }
}
