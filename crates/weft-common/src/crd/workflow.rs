//! Workflow CRD types
//!
//! Defines `Workflow`: a set of templates plus the volumes they may mount.
//! Pod synthesis only reads the parts listed here; scheduling of steps and
//! node status bookkeeping live in the reconciliation loop.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::template::Template;
use crate::k8s::Volume;

/// API version of the Workflow CRD, used in owner references
pub const WORKFLOW_API_VERSION: &str = "weft.dev/v1alpha1";

/// Kind of the Workflow CRD, used in owner references
pub const WORKFLOW_KIND: &str = "Workflow";

/// Workflow specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "weft.dev",
    version = "v1alpha1",
    kind = "Workflow",
    plural = "workflows",
    shortname = "wf",
    namespaced,
    status = "WorkflowStatus",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    /// Name of the template to start from
    #[serde(default)]
    pub entrypoint: String,

    /// Templates available to the workflow's steps
    #[serde(default)]
    pub templates: Vec<Template>,

    /// Volumes templates may mount by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

impl WorkflowSpec {
    /// Look up a template by name
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }
}

/// Status of a Workflow
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    /// Claims provisioned for this workflow, exposed as volumes by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persistent_volume_claims: Vec<Volume>,

    /// Human-readable message about current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
