//! Controller-wide configuration
//!
//! Loaded once at startup from a YAML file:
//!
//! ```yaml
//! executorImage: weft/executor:v0.1.0
//! executorResources:
//!   requests: { cpu: "0.1", memory: 64Mi }
//!   limits: { cpu: "0.5", memory: 512Mi }
//! artifactRepository:
//!   s3:
//!     bucket: my-bucket
//!     endpoint: s3.amazonaws.com
//!     keyPrefix: store
//! ```
//!
//! `WEFT_EXECUTOR_IMAGE` overrides `executorImage` when set.

use std::collections::BTreeMap;
use std::path::Path;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::k8s::ResourceRequirements;
use crate::{Error, Result};

/// Env var overriding the configured executor image
pub const EXECUTOR_IMAGE_ENV: &str = "WEFT_EXECUTOR_IMAGE";

/// Configuration shared by every synthesis call
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Image running the staging and monitor roles
    pub executor_image: String,

    /// Resource bounds applied to the staging and monitor roles
    #[serde(default)]
    pub executor_resources: ExecutorResources,

    /// Where output artifacts go when a template doesn't say
    #[serde(default)]
    pub artifact_repository: ArtifactRepository,
}

impl ControllerConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ControllerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, applying env overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_with_context(
                "config",
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        let mut config: ControllerConfig = serde_yaml::from_str(&data)?;
        if let Ok(image) = std::env::var(EXECUTOR_IMAGE_ENV) {
            if !image.is_empty() {
                debug!(image = %image, "executor image overridden from {}", EXECUTOR_IMAGE_ENV);
                config.executor_image = image;
            }
        }
        config.validate()?;
        info!(
            path = %path.display(),
            executor_image = %config.executor_image,
            default_repository = config.artifact_repository.s3.is_some(),
            "loaded controller config"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.executor_image.is_empty() {
            return Err(Error::internal_with_context(
                "config",
                "executorImage must be set",
            ));
        }
        if let Some(s3) = &self.artifact_repository.s3 {
            if s3.bucket.is_empty() {
                return Err(Error::internal_with_context(
                    "config",
                    "artifactRepository.s3.bucket must be set",
                ));
            }
        }
        Ok(())
    }
}

/// Requests and limits for the executor roles
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorResources {
    /// Floor
    pub requests: ResourceQuantity,
    /// Ceiling
    pub limits: ResourceQuantity,
}

impl Default for ExecutorResources {
    fn default() -> Self {
        Self {
            requests: ResourceQuantity::new("0.1", "64Mi"),
            limits: ResourceQuantity::new("0.5", "512Mi"),
        }
    }
}

impl From<&ExecutorResources> for ResourceRequirements {
    fn from(r: &ExecutorResources) -> Self {
        Self {
            requests: Some(r.requests.to_quantities()),
            limits: Some(r.limits.to_quantities()),
            ..Default::default()
        }
    }
}

/// CPU and memory amounts in Kubernetes quantity notation
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceQuantity {
    /// CPU (e.g., "0.5", "500m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory (e.g., "512Mi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ResourceQuantity {
    /// Create a quantity with both CPU and memory set
    pub fn new(cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            cpu: Some(cpu.into()),
            memory: Some(memory.into()),
        }
    }

    fn to_quantities(&self) -> BTreeMap<String, Quantity> {
        [("cpu", &self.cpu), ("memory", &self.memory)]
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|v| (key.to_string(), Quantity(v.clone())))
            })
            .collect()
    }
}

/// Default artifact repository
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRepository {
    /// S3-compatible repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3ArtifactRepository>,
}

/// S3-compatible default repository
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct S3ArtifactRepository {
    /// Bucket receiving output artifacts
    pub bucket: String,
    /// Endpoint (e.g., "s3.amazonaws.com")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Prefix prepended to every generated key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_default_resources() {
        let config = ControllerConfig::from_yaml("executorImage: weft/executor:v1").unwrap();
        assert_eq!(config.executor_image, "weft/executor:v1");
        assert_eq!(config.executor_resources, ExecutorResources::default());
        assert!(config.artifact_repository.s3.is_none());
    }

    #[test]
    fn default_resources_are_conservative() {
        let reqs = ResourceRequirements::from(&ExecutorResources::default());
        let requests = reqs.requests.unwrap();
        let limits = reqs.limits.unwrap();
        assert_eq!(requests["cpu"].0, "0.1");
        assert_eq!(requests["memory"].0, "64Mi");
        assert_eq!(limits["cpu"].0, "0.5");
        assert_eq!(limits["memory"].0, "512Mi");
    }

    #[test]
    fn unset_amounts_are_left_out() {
        let resources = ExecutorResources {
            requests: ResourceQuantity {
                cpu: None,
                memory: Some("64Mi".to_string()),
            },
            limits: ResourceQuantity::default(),
        };
        let reqs = ResourceRequirements::from(&resources);
        assert_eq!(reqs.requests.unwrap().len(), 1);
        assert!(reqs.limits.unwrap().is_empty());
    }

    #[test]
    fn full_config_parses_artifact_repository() {
        let yaml = r#"
executorImage: weft/executor:v1
executorResources:
  requests: { cpu: "0.2", memory: 128Mi }
  limits: { cpu: "1", memory: 1Gi }
artifactRepository:
  s3:
    bucket: my-bucket
    endpoint: s3.amazonaws.com
    keyPrefix: store
"#;
        let config = ControllerConfig::from_yaml(yaml).unwrap();
        let s3 = config.artifact_repository.s3.unwrap();
        assert_eq!(s3.bucket, "my-bucket");
        assert_eq!(s3.key_prefix.as_deref(), Some("store"));
        assert_eq!(config.executor_resources.limits.memory.as_deref(), Some("1Gi"));
    }

    #[test]
    fn missing_executor_image_is_rejected() {
        let err = ControllerConfig::from_yaml("executorImage: \"\"").unwrap_err();
        assert!(err.to_string().contains("executorImage"));
    }

    #[test]
    fn s3_repository_without_bucket_is_rejected() {
        let yaml = "executorImage: e\nartifactRepository:\n  s3:\n    bucket: \"\"\n";
        assert!(ControllerConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn malformed_yaml_is_serialization_error() {
        let err = ControllerConfig::from_yaml("executorImage: [unterminated").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ControllerConfig::load("/nonexistent/weft/config.yaml").unwrap_err();
        assert_eq!(err.context(), Some("config"));
    }
}
