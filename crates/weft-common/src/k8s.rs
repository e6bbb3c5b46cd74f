//! Kubernetes types used by templates and compiled pods
//!
//! Containers, volumes and mounts are the upstream `k8s-openapi` core/v1
//! types, so every field a user writes (volume sources such as nfs or csi,
//! `envFrom`, probes, extended resources) survives parsing and compilation
//! untouched. The helpers here build the few values the compiler creates
//! itself. Object metadata stays a plain serde struct with builders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use k8s_openapi::api::core::v1::{
    Container, EnvVar, ResourceRequirements, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::api::core::v1::{
    DownwardAPIVolumeFile, DownwardAPIVolumeSource, EmptyDirVolumeSource, EnvVarSource,
    HostPathVolumeSource, ObjectFieldSelector, PersistentVolumeClaimVolumeSource,
};

// =============================================================================
// Metadata
// =============================================================================

/// Object metadata for compiled resources
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Owners of this resource (garbage collected with them)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Create metadata with a name and namespace
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Add an owner reference
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner_references.push(owner);
        self
    }
}

/// Reference from a dependent object to its owner
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    /// Owner API version
    pub api_version: String,
    /// Owner kind
    pub kind: String,
    /// Owner name
    pub name: String,
    /// Owner UID
    pub uid: String,
    /// Whether the owner is the managing controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    /// Block foreground deletion of the owner until this object is gone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

// =============================================================================
// Environment
// =============================================================================

/// Environment variable sourced from a pod field via the downward API
pub fn env_from_field(name: impl Into<String>, field_path: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value_from: Some(EnvVarSource {
            field_ref: Some(field_selector(field_path)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn field_selector(field_path: impl Into<String>) -> ObjectFieldSelector {
    ObjectFieldSelector {
        api_version: Some("v1".to_string()),
        field_path: field_path.into(),
    }
}

// =============================================================================
// Volumes
// =============================================================================

/// Volume backed by an emptyDir
pub fn empty_dir_volume(name: impl Into<String>) -> Volume {
    Volume {
        name: name.into(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

/// Volume backed by a PVC
pub fn pvc_volume(name: impl Into<String>, claim_name: impl Into<String>) -> Volume {
    Volume {
        name: name.into(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim_name.into(),
            read_only: None,
        }),
        ..Default::default()
    }
}

/// Volume backed by an existing host directory
pub fn host_dir_volume(name: impl Into<String>, path: impl Into<String>) -> Volume {
    Volume {
        name: name.into(),
        host_path: Some(HostPathVolumeSource {
            path: path.into(),
            type_: Some("Directory".to_string()),
        }),
        ..Default::default()
    }
}

/// Volume projecting one pod field into a file.
pub fn downward_api_volume(
    name: impl Into<String>,
    file: impl Into<String>,
    field_path: impl Into<String>,
) -> Volume {
    Volume {
        name: name.into(),
        downward_api: Some(DownwardAPIVolumeSource {
            items: Some(vec![DownwardAPIVolumeFile {
                path: file.into(),
                field_ref: Some(field_selector(field_path)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// =============================================================================
// Mounts
// =============================================================================

/// Mount a whole volume read-write
pub fn mount(name: impl Into<String>, mount_path: impl Into<String>) -> VolumeMount {
    VolumeMount {
        name: name.into(),
        mount_path: mount_path.into(),
        ..Default::default()
    }
}

/// Mount a sub path of a volume
pub fn sub_path_mount(
    name: impl Into<String>,
    mount_path: impl Into<String>,
    sub_path: impl Into<String>,
) -> VolumeMount {
    VolumeMount {
        sub_path: Some(sub_path.into()),
        ..mount(name, mount_path)
    }
}

/// Mount a whole volume read-only
pub fn readonly_mount(name: impl Into<String>, mount_path: impl Into<String>) -> VolumeMount {
    VolumeMount {
        read_only: Some(true),
        ..mount(name, mount_path)
    }
}

/// Mounts of a container, empty when unset
pub fn mounts_of(container: &Container) -> &[VolumeMount] {
    container.volume_mounts.as_deref().unwrap_or_default()
}

/// Mutable mounts of a container, created on first use
pub fn mounts_mut(container: &mut Container) -> &mut Vec<VolumeMount> {
    container.volume_mounts.get_or_insert_with(Vec::new)
}
