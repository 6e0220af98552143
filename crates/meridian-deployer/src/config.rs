//! Configuration for meridian-deployer.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use meridian_nuvla::NuvlaConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{DeployerError, DeployerResult};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/meridian/deployer.toml";

/// Top-level configuration for the deployer.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeployerConfig {
    /// Token endpoint used to authenticate with the job manager.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Job manager client configuration.
    #[serde(default)]
    pub job_manager: JobManagerConfig,

    /// Target platform endpoint and API key.
    #[serde(default)]
    pub nuvla: NuvlaConfig,

    /// Reconciliation behaviour.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl DeployerConfig {
    /// Load configuration from a TOML file, with environment overrides.
    ///
    /// Environment variables use the `MERIDIAN_` prefix and `__` as the
    /// section separator (`MERIDIAN_NUVLA__API_SECRET`). A missing file is an
    /// error, as is a configuration without the endpoints and credentials
    /// needed to run.
    pub fn from_file(path: impl AsRef<Path>) -> DeployerResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DeployerError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }

        let config: Self = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("MERIDIAN_").split("__"))
            .extract()
            .map_err(|e| DeployerError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check that every required setting is present.
    pub fn validate(&self) -> DeployerResult<()> {
        let required = [
            ("auth.token_url", self.auth.token_url.is_empty()),
            ("auth.client_id", self.auth.client_id.is_empty()),
            ("job_manager.url", self.job_manager.url.is_empty()),
            ("nuvla.api_key", self.nuvla.api_key.is_empty()),
            ("nuvla.api_secret", self.nuvla.api_secret.expose_secret().is_empty()),
        ];

        let missing: Vec<_> = required
            .iter()
            .filter(|(_, empty)| *empty)
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DeployerError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }
}

/// OAuth2 client-credentials settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token endpoint URL.
    #[serde(default)]
    pub token_url: String,

    /// OAuth2 client identifier.
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret.
    #[serde(default = "empty_secret")]
    pub client_secret: SecretString,

    /// OAuth2 grant type.
    #[serde(default = "default_grant_type")]
    pub grant_type: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_grant_type() -> String {
    "client_credentials".to_owned()
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            client_id: String::new(),
            client_secret: empty_secret(),
            grant_type: default_grant_type(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Job manager client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JobManagerConfig {
    /// Base URL of the job collection (`GET {url}/jobs`).
    #[serde(default)]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Reconciliation behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Orchestrator tag of the jobs this reconciler handles.
    #[serde(default = "default_orchestrator")]
    pub orchestrator: String,

    /// Infrastructure-service subtype deployments are placed on.
    #[serde(default = "default_infrastructure_subtype")]
    pub infrastructure_subtype: String,

    /// Pause between passes, in seconds.
    #[serde(default = "default_idle_interval_secs")]
    pub idle_interval_secs: u64,

    /// Poll interval while waiting for a deployment to settle, in seconds.
    #[serde(default = "default_deployment_poll_secs")]
    pub deployment_poll_secs: u64,

    /// Project path applications are created under.
    #[serde(default = "default_application_parent_path")]
    pub application_parent_path: String,

    /// Author recorded on created applications.
    #[serde(default = "default_application_author")]
    pub application_author: String,
}

fn default_orchestrator() -> String {
    "nuvla".to_owned()
}

fn default_infrastructure_subtype() -> String {
    meridian_nuvla::resources::SUBTYPE_KUBERNETES.to_owned()
}

const fn default_idle_interval_secs() -> u64 {
    10
}

const fn default_deployment_poll_secs() -> u64 {
    5
}

fn default_application_parent_path() -> String {
    "icos/deploymentmanagement".to_owned()
}

fn default_application_author() -> String {
    "group/icos".to_owned()
}

impl ReconcilerConfig {
    /// Pause between passes.
    #[must_use]
    pub const fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs)
    }

    /// Poll interval while waiting for a deployment to settle.
    #[must_use]
    pub const fn deployment_poll_interval(&self) -> Duration {
        Duration::from_secs(self.deployment_poll_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            orchestrator: default_orchestrator(),
            infrastructure_subtype: default_infrastructure_subtype(),
            idle_interval_secs: default_idle_interval_secs(),
            deployment_poll_secs: default_deployment_poll_secs(),
            application_parent_path: default_application_parent_path(),
            application_author: default_application_author(),
        }
    }
}
