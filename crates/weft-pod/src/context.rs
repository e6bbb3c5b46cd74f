//! Workflow context seen by pod synthesis
//!
//! A borrowed view over the owning `Workflow` and the controller config. It
//! owns nothing and is cheap to build per call.

use aws_lc_rs::digest::{digest, SHA256};

use weft_common::crd::{Workflow, WORKFLOW_API_VERSION, WORKFLOW_KIND};
use weft_common::k8s::{OwnerReference, Volume};
use weft_common::{ControllerConfig, Error};

/// Number of hash bytes appended to the workflow name in pod names
const NODE_ID_HASH_BYTES: usize = 5;

/// Everything a compile needs to know about the owning workflow
#[derive(Clone, Copy, Debug)]
pub struct WorkflowContext<'a> {
    name: &'a str,
    namespace: &'a str,
    uid: &'a str,
    volumes: &'a [Volume],
    claims: &'a [Volume],
    config: &'a ControllerConfig,
}

impl<'a> WorkflowContext<'a> {
    /// Build a context from a Workflow and the controller config.
    ///
    /// The workflow must carry a name, namespace and uid: pods are named
    /// after it and owned by it.
    pub fn new(workflow: &'a Workflow, config: &'a ControllerConfig) -> Result<Self, Error> {
        let name = workflow
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::internal_with_context("context", "workflow has no name"))?;
        let namespace = workflow.metadata.namespace.as_deref().ok_or_else(|| {
            Error::internal_with_context("context", format!("workflow {} has no namespace", name))
        })?;
        let uid = workflow.metadata.uid.as_deref().ok_or_else(|| {
            Error::internal_with_context("context", format!("workflow {} has no uid", name))
        })?;
        let claims = workflow
            .status
            .as_ref()
            .map(|s| s.persistent_volume_claims.as_slice())
            .unwrap_or_default();

        Ok(Self {
            name,
            namespace,
            uid,
            volumes: &workflow.spec.volumes,
            claims,
            config,
        })
    }

    /// Workflow name
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Workflow namespace (pods are created here)
    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    /// Volumes declared in the workflow spec
    pub fn volumes(&self) -> &'a [Volume] {
        self.volumes
    }

    /// Claim volumes recorded in the workflow status
    pub fn claims(&self) -> &'a [Volume] {
        self.claims
    }

    /// Controller-wide configuration
    pub fn config(&self) -> &'a ControllerConfig {
        self.config
    }

    /// Deterministic pod name for a node of this workflow.
    ///
    /// `<workflow-name>-<hash>` where the hash covers the workflow uid and the
    /// node name, so two incarnations of a same-named workflow never share
    /// pod names.
    pub fn node_id(&self, node_name: &str) -> String {
        let input = format!("{}/{}", self.uid, node_name);
        let hash = digest(&SHA256, input.as_bytes());
        let suffix: String = hash
            .as_ref()
            .iter()
            .take(NODE_ID_HASH_BYTES)
            .map(|b| format!("{:02x}", b))
            .collect();
        format!("{}-{}", self.name, suffix)
    }

    /// Owner reference making the workflow the controller of its pods
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: WORKFLOW_API_VERSION.to_string(),
            kind: WORKFLOW_KIND.to_string(),
            name: self.name.to_string(),
            uid: self.uid.to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_common::crd::{WorkflowSpec, WorkflowStatus};
    use weft_common::k8s::pvc_volume;
    use weft_common::ErrorKind;

    fn config() -> ControllerConfig {
        ControllerConfig {
            executor_image: "weft/executor:test".to_string(),
            ..Default::default()
        }
    }

    fn workflow(name: &str, uid: &str) -> Workflow {
        let mut wf = Workflow::new(name, WorkflowSpec::default());
        wf.metadata.namespace = Some("default".to_string());
        wf.metadata.uid = Some(uid.to_string());
        wf
    }

    #[test]
    fn node_id_is_deterministic() {
        let cfg = config();
        let wf = workflow("wf", "uid-1");
        let ctx = WorkflowContext::new(&wf, &cfg).unwrap();
        assert_eq!(ctx.node_id("wf[0].build"), ctx.node_id("wf[0].build"));
        assert!(ctx.node_id("wf[0].build").starts_with("wf-"));
        assert_eq!(ctx.node_id("wf[0].build").len(), "wf-".len() + 2 * NODE_ID_HASH_BYTES);
    }

    #[test]
    fn node_id_differs_per_node_and_per_incarnation() {
        let cfg = config();
        let first = workflow("wf", "uid-1");
        let second = workflow("wf", "uid-2");
        let ctx1 = WorkflowContext::new(&first, &cfg).unwrap();
        let ctx2 = WorkflowContext::new(&second, &cfg).unwrap();
        assert_ne!(ctx1.node_id("a"), ctx1.node_id("b"));
        assert_ne!(ctx1.node_id("a"), ctx2.node_id("a"));
    }

    #[test]
    fn owner_reference_points_at_workflow() {
        let cfg = config();
        let wf = workflow("wf", "uid-1");
        let owner = WorkflowContext::new(&wf, &cfg).unwrap().owner_reference();
        assert_eq!(owner.api_version, "weft.dev/v1alpha1");
        assert_eq!(owner.kind, "Workflow");
        assert_eq!(owner.uid, "uid-1");
        assert_eq!(owner.block_owner_deletion, Some(true));
    }

    #[test]
    fn missing_uid_is_internal_error() {
        let cfg = config();
        let mut wf = workflow("wf", "uid-1");
        wf.metadata.uid = None;
        let err = WorkflowContext::new(&wf, &cfg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("no uid"));
    }

    #[test]
    fn missing_namespace_is_internal_error() {
        let cfg = config();
        let mut wf = workflow("wf", "uid-1");
        wf.metadata.namespace = None;
        assert!(WorkflowContext::new(&wf, &cfg).is_err());
    }

    #[test]
    fn claims_come_from_status() {
        let cfg = config();
        let mut wf = workflow("wf", "uid-1");
        let ctx = WorkflowContext::new(&wf, &cfg).unwrap();
        assert!(ctx.claims().is_empty());

        wf.status = Some(WorkflowStatus {
            persistent_volume_claims: vec![pvc_volume("workdir", "wf-workdir")],
            message: None,
        });
        let ctx = WorkflowContext::new(&wf, &cfg).unwrap();
        assert_eq!(ctx.claims()[0].name, "workdir");
    }
}
