//! Core types for meridian-deployer.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "`.")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique identifier of a job in the job manager.
    JobId
);

string_id!(
    /// Identifier shared by jobs that must be deployed together.
    GroupId
);

string_id!(
    /// Platform credential granting deployment rights on one target.
    CredentialId
);

string_id!(
    /// Platform-assigned identifier of a launched deployment.
    DeploymentId
);

/// Lock state of a job as tracked by the job manager.
///
/// Encoded on the wire as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LockState {
    /// Waiting to be picked up.
    #[default]
    Created,
    /// Locked by a reconciler while its deployment is launched.
    Processing,
    /// Deployment launched; the job is done.
    Completed,
    /// Deployment is running with problems.
    Degraded,
}

impl LockState {
    /// Wire encoding of the state.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Created => 1,
            Self::Processing => 2,
            Self::Completed => 3,
            Self::Degraded => 4,
        }
    }

    /// Get the state name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Degraded => "degraded",
        }
    }

    /// Value of the job manager's locker flag for this state.
    ///
    /// Only `Created` and `Degraded` jobs are released for pickup.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Processing | Self::Completed)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<u8> for LockState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Created),
            2 => Ok(Self::Processing),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Degraded),
            _ => Err(format!("unknown job state: {value}")),
        }
    }
}

impl From<LockState> for u8 {
    fn from(state: LockState) -> Self {
        state.as_u8()
    }
}

/// A deployment destination attached to a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TargetRef {
    /// Cluster the job should land on. Absent for targets that only carry
    /// other orchestrators' attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

impl TargetRef {
    /// Create a target reference for a named cluster.
    #[must_use]
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            cluster_name: Some(name.into()),
        }
    }
}

/// One requested container deployment, as delivered by the job manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawJob {
    /// Unique job identifier.
    #[serde(rename = "ID")]
    pub id: JobId,
    /// Group of co-deployed jobs.
    #[serde(rename = "job_group_id")]
    pub group_id: GroupId,
    /// Human-readable group label.
    #[serde(rename = "job_group_name", default)]
    pub group_name: String,
    /// Orchestrator tag selecting the deployment path.
    #[serde(default)]
    pub orchestrator: String,
    /// Deployable unit description.
    #[serde(default)]
    pub manifest: String,
    /// Requested destinations.
    #[serde(default)]
    pub targets: Vec<TargetRef>,
    /// Current lock state.
    #[serde(rename = "state", default)]
    pub lock_state: LockState,
}

/// Outcome of one successful launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Group whose merged manifest was launched.
    pub group_id: GroupId,
    /// Cluster name of the target the deployment was launched on.
    pub target: String,
    /// Platform deployment identifier.
    pub deployment_id: DeploymentId,
}

impl fmt::Display for DeploymentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} as {}", self.group_id, self.target, self.deployment_id)
    }
}
