//! Executor role containers
//!
//! Staging (`init`) and monitor (`wait`) roles run the executor image with the
//! same environment, resource bounds and security posture. Every function
//! here returns fresh values so one compile can never leak into another.

use weft_common::config::ExecutorResources;
use weft_common::k8s::{
    env_from_field, Container, EnvVar, ResourceRequirements, SecurityContext,
};
use weft_common::{
    ControllerConfig, ENV_VAR_HOST_IP, ENV_VAR_NAMESPACE, ENV_VAR_POD_IP, ENV_VAR_POD_NAME,
    EXECUTOR_BINARY, INIT_CONTAINER_NAME, WAIT_CONTAINER_NAME,
};

use crate::volumes::{docker_lib_mount, pod_metadata_mount};

/// Environment exposing the pod's own identity to the executor.
///
/// Values come from the downward API, never from the caller.
pub fn exec_env_vars() -> Vec<EnvVar> {
    vec![
        env_from_field(ENV_VAR_HOST_IP, "status.hostIP"),
        env_from_field(ENV_VAR_POD_IP, "status.podIP"),
        env_from_field(ENV_VAR_POD_NAME, "metadata.name"),
        env_from_field(ENV_VAR_NAMESPACE, "metadata.namespace"),
    ]
}

/// Build the base container shared by every executor role
pub fn build_role(
    name: &str,
    image: &str,
    privileged: bool,
    resources: &ExecutorResources,
) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        env: Some(exec_env_vars()),
        resources: Some(ResourceRequirements::from(resources)),
        security_context: Some(SecurityContext {
            privileged: Some(privileged),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Staging role: materializes input artifacts and script source before the payload starts
pub(crate) fn staging_role(config: &ControllerConfig) -> Container {
    let mut ctr = build_role(
        INIT_CONTAINER_NAME,
        &config.executor_image,
        false,
        &config.executor_resources,
    );
    ctr.command = Some(vec![EXECUTOR_BINARY.to_string()]);
    ctr.args = Some(vec!["stage".to_string()]);
    ctr.volume_mounts = Some(vec![pod_metadata_mount()]);
    ctr
}

/// Monitor role: watches the payload and collects its outputs
pub(crate) fn monitor_role(config: &ControllerConfig) -> Container {
    let mut ctr = build_role(
        WAIT_CONTAINER_NAME,
        &config.executor_image,
        false,
        &config.executor_resources,
    );
    ctr.command = Some(vec![EXECUTOR_BINARY.to_string()]);
    ctr.args = Some(vec!["monitor".to_string()]);
    ctr.volume_mounts = Some(vec![pod_metadata_mount(), docker_lib_mount()]);
    ctr
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_common::k8s::mounts_of;
    use weft_common::{DOCKER_LIB_VOLUME_NAME, POD_METADATA_VOLUME_NAME};

    fn config() -> ControllerConfig {
        ControllerConfig {
            executor_image: "weft/executor:v1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn build_role_applies_image_resources_and_posture() {
        let ctr = build_role("init", "weft/executor:v1", true, &ExecutorResources::default());
        assert_eq!(ctr.name, "init");
        assert_eq!(ctr.image.as_deref(), Some("weft/executor:v1"));
        assert_eq!(
            ctr.security_context.as_ref().and_then(|s| s.privileged),
            Some(true)
        );

        let resources = ctr.resources.unwrap();
        assert_eq!(resources.limits.unwrap()["memory"].0, "512Mi");
        assert_eq!(resources.requests.unwrap()["cpu"].0, "0.1");
    }

    #[test]
    fn exec_env_is_sourced_from_downward_api() {
        let env = exec_env_vars();
        let names: Vec<&str> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["WEFT_HOST_IP", "WEFT_POD_IP", "WEFT_POD_NAME", "WEFT_NAMESPACE"]
        );
        for var in &env {
            assert!(var.value.is_none(), "{} must not be hardcoded", var.name);
            assert!(var
                .value_from
                .as_ref()
                .and_then(|v| v.field_ref.as_ref())
                .is_some());
        }
    }

    #[test]
    fn roles_are_fresh_per_call() {
        let cfg = config();
        let mut first = staging_role(&cfg);
        first.env = None;
        first.volume_mounts = None;
        let second = staging_role(&cfg);
        assert_eq!(second.env.as_ref().map(Vec::len), Some(4));
        assert_eq!(mounts_of(&second).len(), 1);
    }

    #[test]
    fn staging_mounts_pod_metadata_only() {
        let ctr = staging_role(&config());
        assert_eq!(ctr.name, INIT_CONTAINER_NAME);
        assert_eq!(mounts_of(&ctr)[0].name, POD_METADATA_VOLUME_NAME);
        assert_eq!(mounts_of(&ctr).len(), 1);
    }

    #[test]
    fn monitor_mounts_runtime_storage_read_only() {
        let ctr = monitor_role(&config());
        assert_eq!(ctr.name, WAIT_CONTAINER_NAME);
        let docker = mounts_of(&ctr)
            .iter()
            .find(|m| m.name == DOCKER_LIB_VOLUME_NAME)
            .unwrap();
        assert_eq!(docker.read_only, Some(true));
        assert_eq!(
            ctr.security_context.and_then(|s| s.privileged),
            Some(false)
        );
    }
}
