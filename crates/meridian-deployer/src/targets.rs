//! Classification of deployment targets.
//!
//! A target is native when its cluster name is a platform resource ID this
//! reconciler can deploy to: an edge device (`nuvlabox/<uuid>`) or an
//! infrastructure service (`infrastructure-service/<uuid>`). Every other
//! target belongs to a different deployment path and is ignored here.

use meridian_nuvla::ResourceKind;
use serde::Serialize;

use crate::types::TargetRef;

/// Kind of platform resource a native target names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeKind {
    /// An edge device.
    NuvlaBox,
    /// An infrastructure service.
    InfrastructureService,
}

impl NativeKind {
    const ALL: [Self; 2] = [Self::NuvlaBox, Self::InfrastructureService];

    /// Platform collection for this kind.
    #[must_use]
    pub const fn resource_kind(&self) -> ResourceKind {
        match self {
            Self::NuvlaBox => ResourceKind::NuvlaBox,
            Self::InfrastructureService => ResourceKind::InfrastructureService,
        }
    }

    /// Attribute holding the infrastructure-service group that owns a
    /// resource of this kind.
    #[must_use]
    pub const fn group_attribute(&self) -> &'static str {
        match self {
            Self::NuvlaBox => "infrastructure-service-group",
            Self::InfrastructureService => "parent",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::NuvlaBox => "nuvlabox/",
            Self::InfrastructureService => "infrastructure-service/",
        }
    }
}

/// A target this reconciler owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NativeTarget {
    kind: NativeKind,
    cluster_name: String,
}

impl NativeTarget {
    /// Kind of resource the target names.
    #[must_use]
    pub const fn kind(&self) -> NativeKind {
        self.kind
    }

    /// The cluster name, which is also the platform resource ID.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// The resource UUID without the collection prefix.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.cluster_name[self.kind.prefix().len()..]
    }
}

/// Result of classifying a [`TargetRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Deployable by this reconciler.
    Native(NativeTarget),
    /// Owned by another deployment path.
    Other,
}

impl Target {
    /// Classify a target reference by its cluster name.
    #[must_use]
    pub fn classify(target: &TargetRef) -> Self {
        let Some(cluster_name) = target.cluster_name.as_deref() else {
            return Self::Other;
        };

        NativeKind::ALL
            .into_iter()
            .find(|kind| cluster_name.starts_with(kind.prefix()))
            .map_or(Self::Other, |kind| {
                Self::Native(NativeTarget {
                    kind,
                    cluster_name: cluster_name.to_owned(),
                })
            })
    }

    /// Returns the native target, if any.
    #[must_use]
    pub fn into_native(self) -> Option<NativeTarget> {
        match self {
            Self::Native(target) => Some(target),
            Self::Other => None,
        }
    }
}

/// The native targets among `targets`, in order.
#[must_use]
pub fn native_targets(targets: &[TargetRef]) -> Vec<NativeTarget> {
    targets
        .iter()
        .filter_map(|t| Target::classify(t).into_native())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_targets() {
        assert!(native_targets(&[]).is_empty());
        assert!(native_targets(&[TargetRef::default()]).is_empty());
    }

    #[test]
    fn foreign_targets_are_ignored() {
        let targets = [
            TargetRef::default(),
            TargetRef::cluster("foo"),
            TargetRef::cluster("bar"),
        ];
        assert!(native_targets(&targets).is_empty());
    }

    #[test]
    fn both_native_kinds_are_recognised() {
        let targets = [
            TargetRef::cluster("nuvlabox/x"),
            TargetRef::cluster("infrastructure-service/y"),
        ];
        let native = native_targets(&targets);

        assert_eq!(native.len(), 2);
        assert_eq!(native[0].kind(), NativeKind::NuvlaBox);
        assert_eq!(native[0].cluster_name(), "nuvlabox/x");
        assert_eq!(native[0].uuid(), "x");
        assert_eq!(native[1].kind(), NativeKind::InfrastructureService);
        assert_eq!(native[1].uuid(), "y");
    }

    #[test]
    fn prefix_must_lead() {
        assert_eq!(Target::classify(&TargetRef::cluster("my-nuvlabox/x")), Target::Other);
        assert_eq!(Target::classify(&TargetRef::cluster("nuvlabox")), Target::Other);
    }

    #[test]
    fn group_attribute_per_kind() {
        assert_eq!(NativeKind::NuvlaBox.group_attribute(), "infrastructure-service-group");
        assert_eq!(NativeKind::InfrastructureService.group_attribute(), "parent");
        assert_eq!(NativeKind::NuvlaBox.resource_kind(), ResourceKind::NuvlaBox);
    }
}
