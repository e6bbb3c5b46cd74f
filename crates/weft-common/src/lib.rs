//! Common types for weft: CRDs, errors, Kubernetes wire types and configuration

#![deny(missing_docs)]

pub mod config;
pub mod crd;
pub mod error;
pub mod k8s;
pub mod telemetry;

pub use config::ControllerConfig;
pub use error::{Error, ErrorKind};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Labels and annotations
// =============================================================================

/// Label carrying the name of the owning Workflow (allows filtering pods by workflow)
pub const LABEL_WORKFLOW: &str = "weft.dev/workflow";

/// Standard Kubernetes managed-by label key
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label for every resource weft creates
pub const LABEL_MANAGED_BY_WEFT: &str = "weft";

/// Annotation carrying the workflow node (step) name a pod was synthesized for
pub const ANNOTATION_NODE_NAME: &str = "weft.dev/node-name";

/// Annotation carrying the fully-resolved template as JSON.
///
/// The staging and monitor roles read this back through the pod metadata volume.
pub const ANNOTATION_TEMPLATE: &str = "weft.dev/template";

// =============================================================================
// Role (container) names
// =============================================================================

/// Staging role: materializes input artifacts and script source
pub const INIT_CONTAINER_NAME: &str = "init";

/// Monitor role: observes the payload and reports outputs
pub const WAIT_CONTAINER_NAME: &str = "wait";

/// Payload role: the user's container or script
pub const MAIN_CONTAINER_NAME: &str = "main";

// =============================================================================
// Platform volumes and paths
// =============================================================================

/// Volume exposing pod annotations as a file
pub const POD_METADATA_VOLUME_NAME: &str = "podmetadata";

/// Where the pod metadata volume is mounted in staging and monitor roles
pub const POD_METADATA_MOUNT_PATH: &str = "/weft/podmetadata";

/// File name of the annotations item inside the pod metadata volume
pub const POD_METADATA_ANNOTATIONS_FILE: &str = "annotations";

/// Volume exposing the host's container runtime storage to the monitor
pub const DOCKER_LIB_VOLUME_NAME: &str = "docker-lib";

/// Host path of the container runtime storage
pub const DOCKER_LIB_HOST_PATH: &str = "/var/lib/docker";

/// Shared emptyDir carrying input artifacts from staging to payload
pub const INPUT_ARTIFACTS_VOLUME_NAME: &str = "input-artifacts";

/// Base directory of the input artifacts volume inside the staging role
pub const EXECUTOR_ARTIFACT_BASE_DIR: &str = "/weft/inputs/artifacts";

/// Shared emptyDir carrying script source from staging to payload
pub const SCRIPT_VOLUME_NAME: &str = "script";

/// Mount path of the script volume in staging and payload roles
pub const SCRIPT_TEMPLATE_DIR: &str = "/weft/script";

/// Path of the extracted script source, passed as the payload's argument
pub const SCRIPT_TEMPLATE_SOURCE_PATH: &str = "/weft/script/source";

/// Prefix under which the payload's explicit mounts are re-rooted in the staging role
pub const MAIN_CONTAINER_FS_PREFIX: &str = "/mainctrfs";

// =============================================================================
// Executor environment
// =============================================================================

/// Env var with the node (host) IP
pub const ENV_VAR_HOST_IP: &str = "WEFT_HOST_IP";

/// Env var with the pod IP
pub const ENV_VAR_POD_IP: &str = "WEFT_POD_IP";

/// Env var with the pod name
pub const ENV_VAR_POD_NAME: &str = "WEFT_POD_NAME";

/// Env var with the pod namespace
pub const ENV_VAR_NAMESPACE: &str = "WEFT_NAMESPACE";

/// Executor binary invoked by the staging and monitor roles
pub const EXECUTOR_BINARY: &str = "weftexec";
