//! Custom Resource Definitions for weft

mod template;
mod workflow;

pub use template::{
    Artifact, GitArtifact, HttpArtifact, Inputs, Invocation, Outputs, S3Artifact, ScriptTemplate,
    Sidecar, Template,
};
pub use workflow::{Workflow, WorkflowSpec, WorkflowStatus, WORKFLOW_API_VERSION, WORKFLOW_KIND};
