//! Compiled execution unit
//!
//! A Kubernetes Pod in plain serde types. Role order is fixed: the staging
//! role is the only init container; containers are monitor, payload, then
//! sidecars in declaration order.

use serde::{Deserialize, Serialize};

use weft_common::crd::Template;
use weft_common::k8s::{Container, ObjectMeta, Volume};
use weft_common::{Error, ANNOTATION_TEMPLATE};

/// Restart policy of every unit: retries belong to the reconciliation loop
pub const RESTART_POLICY_NEVER: &str = "Never";

/// A compiled workflow step, ready for submission
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionUnit {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: PodSpec,
}

/// Pod spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Restart policy
    pub restart_policy: String,
    /// Init containers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<Container>,
    /// Containers
    pub containers: Vec<Container>,
    /// Volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

impl ExecutionUnit {
    /// Create an empty unit with the given metadata
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            metadata,
            spec: PodSpec {
                restart_policy: RESTART_POLICY_NEVER.to_string(),
                init_containers: Vec::new(),
                containers: Vec::new(),
                volumes: Vec::new(),
            },
        }
    }

    /// Unit name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Namespace the unit is created in
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Find a role (init or regular container) by name
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.spec
            .init_containers
            .iter()
            .chain(self.spec.containers.iter())
            .find(|c| c.name == name)
    }

    /// Find a volume by name
    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.spec.volumes.iter().find(|v| v.name == name)
    }

    /// Read back the resolved template embedded in the unit's annotations.
    ///
    /// This is what the staging and monitor roles see.
    pub fn resolved_template(&self) -> Result<Template, Error> {
        let raw = self
            .metadata
            .annotations
            .get(ANNOTATION_TEMPLATE)
            .ok_or_else(|| {
                Error::internal_with_context(
                    "unit",
                    format!("pod {} has no {} annotation", self.name(), ANNOTATION_TEMPLATE),
                )
            })?;
        Ok(serde_json::from_str(raw)?)
    }
}
