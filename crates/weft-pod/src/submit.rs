//! Idempotent pod submission
//!
//! Pod names are a pure function of the workflow uid and node name, so a
//! create that collides with an existing pod means an earlier pass already
//! succeeded and the controller died before recording it. That collision is
//! reported as [`SubmitOutcome::AlreadyExists`], a success.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, PostParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::{info, warn};

use weft_common::crd::Template;
use weft_common::{Error, ANNOTATION_NODE_NAME};

use crate::compiler::PodCompiler;
use crate::context::WorkflowContext;
use crate::unit::ExecutionUnit;

/// Default bound on a single create call
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Why the control plane didn't create a pod
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    /// A pod with this name already exists
    #[error("pod {name} already exists")]
    AlreadyExists {
        /// Pod name
        name: String,
    },

    /// The API server refused the request
    #[error("create rejected ({code}): {message}")]
    Rejected {
        /// HTTP status code
        code: u16,
        /// Server message
        message: String,
    },

    /// Transport or client failure
    #[error("kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    /// The unit could not be converted into an API object
    #[error("failed to encode pod: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Control plane operations needed to submit pods
///
/// Mocked in tests; backed by the Kubernetes API in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PodClient: Send + Sync {
    /// Create the pod, returning the name the server assigned
    async fn create(&self, unit: &ExecutionUnit) -> Result<String, CreateError>;
}

/// [`PodClient`] backed by a kube `Client`
pub struct KubePodClient {
    client: Client,
}

impl KubePodClient {
    /// Create a new KubePodClient wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodClient for KubePodClient {
    async fn create(&self, unit: &ExecutionUnit) -> Result<String, CreateError> {
        let pod: Pod = serde_json::from_value(serde_json::to_value(unit)?)?;
        let api: Api<Pod> = Api::namespaced(self.client.clone(), unit.namespace());

        match api.create(&PostParams::default(), &pod).await {
            Ok(created) => Ok(created
                .metadata
                .name
                .unwrap_or_else(|| unit.name().to_string())),
            Err(e) => Err(classify_create_error(unit.name(), e)),
        }
    }
}

/// Map a failed create onto [`CreateError`].
///
/// Only a 409 with reason `AlreadyExists` means the pod is there. Other
/// conflicts (quota or admission races) are rejections like any other.
fn classify_create_error(name: &str, err: kube::Error) -> CreateError {
    match err {
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            CreateError::AlreadyExists {
                name: name.to_string(),
            }
        }
        kube::Error::Api(ae) => CreateError::Rejected {
            code: ae.code,
            message: ae.message,
        },
        e => CreateError::Kube(e),
    }
}

/// Successful submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The pod was created by this call
    Created {
        /// Pod name
        name: String,
    },
    /// An earlier call already created the pod
    AlreadyExists {
        /// Pod name
        name: String,
    },
}

impl SubmitOutcome {
    /// Pod name, whichever way it came to exist
    pub fn name(&self) -> &str {
        match self {
            Self::Created { name } | Self::AlreadyExists { name } => name,
        }
    }
}

/// Submit a compiled unit.
///
/// Anything other than created or already-exists becomes an internal error,
/// including running past `timeout`. Callers retry the whole reconciliation
/// pass, not just this call.
pub async fn submit(
    client: &dyn PodClient,
    unit: &ExecutionUnit,
    timeout: Duration,
) -> Result<SubmitOutcome, Error> {
    let node = unit
        .metadata
        .annotations
        .get(ANNOTATION_NODE_NAME)
        .map(String::as_str)
        .unwrap_or_default();

    match tokio::time::timeout(timeout, client.create(unit)).await {
        Ok(Ok(name)) => {
            info!(pod = %name, node = %node, "created pod");
            Ok(SubmitOutcome::Created { name })
        }
        Ok(Err(CreateError::AlreadyExists { name })) => {
            info!(pod = %name, node = %node, "pod already exists");
            Ok(SubmitOutcome::AlreadyExists { name })
        }
        Ok(Err(e)) => {
            warn!(pod = %unit.name(), node = %node, error = %e, "failed to create pod");
            Err(Error::internal_with_context(
                "submit",
                format!("failed to create pod {}: {}", unit.name(), e),
            ))
        }
        Err(_) => {
            warn!(pod = %unit.name(), node = %node, timeout = ?timeout, "pod create timed out");
            Err(Error::internal_with_context(
                "submit",
                format!("timed out creating pod {} after {:?}", unit.name(), timeout),
            ))
        }
    }
}

/// Compile `template` for `node_name` and submit the result
pub async fn compile_and_submit(
    client: &dyn PodClient,
    node_name: &str,
    template: &Template,
    ctx: WorkflowContext<'_>,
    timeout: Duration,
) -> Result<SubmitOutcome, Error> {
    let unit = PodCompiler::new(node_name, template, ctx).compile()?;
    submit(client, &unit, timeout).await
}
