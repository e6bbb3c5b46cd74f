//! Template types
//!
//! A `Template` describes one workflow step: what runs (a container or a
//! script), which artifacts flow in and out, and which side-processes run
//! alongside it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::k8s::{Container, VolumeMount};
use crate::Error;

// =============================================================================
// Template
// =============================================================================

/// One workflow step.
///
/// On the wire `container` and `script` are independent optional fields, so
/// a malformed object can carry both or neither. Consumers go through
/// [`Template::invocation`] which only ever yields one of the two.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Template name, referenced by workflow steps
    pub name: String,

    /// Run a user-supplied container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,

    /// Run a script inside an image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptTemplate>,

    /// Inputs consumed by this step
    #[serde(default, skip_serializing_if = "Inputs::is_empty")]
    pub inputs: Inputs,

    /// Outputs produced by this step
    #[serde(default, skip_serializing_if = "Outputs::is_empty")]
    pub outputs: Outputs,

    /// Side-processes running next to the payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidecars: Vec<Sidecar>,
}

/// What a template runs
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Invocation<'a> {
    /// A container spec reused verbatim as the payload
    Container(&'a Container),
    /// A script whose source is materialized by the staging role
    Script(&'a ScriptTemplate),
}

impl Template {
    /// Resolve what this template runs.
    ///
    /// Fails with an internal error when neither or both of `container` and
    /// `script` are set: admission should have rejected such a template.
    pub fn invocation(&self) -> Result<Invocation<'_>, Error> {
        match (&self.container, &self.script) {
            (Some(container), None) => Ok(Invocation::Container(container)),
            (None, Some(script)) => Ok(Invocation::Script(script)),
            (None, None) => Err(Error::internal_with_context(
                "template",
                format!(
                    "cannot create container from non-container/script template '{}'",
                    self.name
                ),
            )),
            (Some(_), Some(_)) => Err(Error::internal_with_context(
                "template",
                format!(
                    "template '{}' sets both container and script",
                    self.name
                ),
            )),
        }
    }

    /// Whether this template runs a script
    pub fn is_script(&self) -> bool {
        self.script.is_some()
    }
}

/// Script invocation
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptTemplate {
    /// Image providing the interpreter
    pub image: String,
    /// Interpreter command (e.g., `["python"]`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Script source code
    pub source: String,
    /// Volumes mounted into the payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

// =============================================================================
// Artifacts
// =============================================================================

/// Inputs of a template
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    /// Artifacts placed into the payload's filesystem before it starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl Inputs {
    /// True when there are no inputs
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Outputs of a template
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Outputs {
    /// Artifacts collected from the payload after it finishes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl Outputs {
    /// True when there are no outputs
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// A named file or directory moved in or out of a step
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Artifact name, unique within its inputs or outputs list
    pub name: String,

    /// Path in the payload's filesystem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Reference to an artifact produced by an earlier step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// S3 location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Artifact>,

    /// Git location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitArtifact>,

    /// HTTP location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpArtifact>,
}

impl Artifact {
    /// Create an artifact with a name and path
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Whether a storage location was set explicitly
    pub fn has_location(&self) -> bool {
        self.s3.is_some() || self.git.is_some() || self.http.is_some()
    }
}

/// Object in an S3-compatible bucket
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct S3Artifact {
    /// Bucket name
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Endpoint (e.g., "s3.amazonaws.com")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Git repository checkout
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitArtifact {
    /// Repository URL
    pub repo: String,
    /// Commit, tag or branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// File served over HTTP
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpArtifact {
    /// URL to fetch
    pub url: String,
}

// =============================================================================
// Sidecars
// =============================================================================

/// Side-process running next to the payload
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sidecar {
    /// Container spec
    #[serde(flatten)]
    pub container: Container,

    /// Copy every payload mount onto this sidecar
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mirror_volume_mounts: bool,
}

// =============================================================================
// Tests
// =============================================================================
