//! PodCompiler - turns one workflow template into an execution unit
//!
//! Pipeline:
//! 1. Copy the template; only the copy is mutated
//! 2. Build the payload role from the container or script invocation
//! 3. Build the monitor role and, for artifacts or scripts, the staging role
//! 4. Attach platform volumes (pod metadata, runtime storage)
//! 5. Resolve the payload's explicit volume references
//! 6. Bind input artifacts through the shared artifacts volume, skipping
//!    paths shadowed by an explicit mount
//! 7. Attach the script volume for script templates
//! 8. Inject default output artifact locations
//! 9. Append sidecars, mirroring payload mounts where requested
//! 10. Embed the resolved template and identity metadata
//!
//! Any failure aborts the compile; nothing partial is ever returned.

use tracing::{debug, info};

use weft_common::crd::{Artifact, Invocation, Sidecar, Template};
use weft_common::k8s::{
    empty_dir_volume, mount, mounts_mut, mounts_of, sub_path_mount, Container, ObjectMeta,
    VolumeMount,
};
use weft_common::{
    Error, ANNOTATION_NODE_NAME, ANNOTATION_TEMPLATE, EXECUTOR_ARTIFACT_BASE_DIR,
    INIT_CONTAINER_NAME, INPUT_ARTIFACTS_VOLUME_NAME, LABEL_MANAGED_BY, LABEL_MANAGED_BY_WEFT,
    LABEL_WORKFLOW, MAIN_CONTAINER_FS_PREFIX, MAIN_CONTAINER_NAME, SCRIPT_TEMPLATE_DIR,
    SCRIPT_TEMPLATE_SOURCE_PATH, SCRIPT_VOLUME_NAME, WAIT_CONTAINER_NAME,
};

use crate::artifacts::inject_defaults;
use crate::context::WorkflowContext;
use crate::roles::{monitor_role, staging_role};
use crate::unit::ExecutionUnit;
use crate::volumes::{
    check_reserved_names, docker_lib_volume, find_overlap, is_nested_under, paths_overlap,
    pod_metadata_volume, VolumeSet,
};

/// Compiles a template into an [`ExecutionUnit`] for one workflow node
pub struct PodCompiler<'a> {
    node_name: &'a str,
    template: &'a Template,
    ctx: WorkflowContext<'a>,
}

impl<'a> PodCompiler<'a> {
    /// Create a compiler for `template` running as node `node_name`
    pub fn new(node_name: &'a str, template: &'a Template, ctx: WorkflowContext<'a>) -> Self {
        Self {
            node_name,
            template,
            ctx,
        }
    }

    /// Compile the template.
    ///
    /// Bad-request errors mean the template needs fixing; internal errors
    /// mean an upstream contract was broken.
    pub fn compile(self) -> Result<ExecutionUnit, Error> {
        let config = self.ctx.config();
        let mut tmpl = self.template.clone();
        let pod_name = self.ctx.node_id(self.node_name);

        info!(
            workflow = %self.ctx.name(),
            node = %self.node_name,
            pod = %pod_name,
            template = %tmpl.name,
            "compiling pod"
        );

        let mut main = payload_role(&tmpl)?;
        let explicit_mounts = mounts_of(&main).to_vec();
        check_reserved_names(&explicit_mounts, "volumeMounts")?;
        if tmpl.is_script() {
            check_script_dir_free(&explicit_mounts, &tmpl.inputs.artifacts)?;
        }

        let needs_staging = !tmpl.inputs.artifacts.is_empty() || tmpl.is_script();
        let mut staging = needs_staging.then(|| staging_role(config));
        let wait = monitor_role(config);

        let mut volumes = VolumeSet::new();
        volumes.insert(pod_metadata_volume());
        volumes.insert(docker_lib_volume());

        volumes.add_references(&explicit_mounts, &self.ctx)?;

        if !tmpl.inputs.artifacts.is_empty() {
            let paths = validate_input_artifacts(&tmpl.inputs.artifacts)?;
            volumes.insert(empty_dir_volume(INPUT_ARTIFACTS_VOLUME_NAME));

            if let Some(staging) = staging.as_mut() {
                let staging_mounts = mounts_mut(staging);
                staging_mounts.push(mount(INPUT_ARTIFACTS_VOLUME_NAME, EXECUTOR_ARTIFACT_BASE_DIR));
                staging_mounts.extend(explicit_mounts.iter().map(rerooted_mount));
            }

            for (artifact, path) in tmpl.inputs.artifacts.iter().zip(paths) {
                if let Some(shadow) = find_overlap(&explicit_mounts, path) {
                    debug!(
                        pod = %pod_name,
                        artifact = %artifact.name,
                        path = %path,
                        volume = %shadow.name,
                        mount_path = %shadow.mount_path,
                        "artifact path shadowed by explicit mount, staging writes into volume"
                    );
                    continue;
                }
                mounts_mut(&mut main).push(sub_path_mount(
                    INPUT_ARTIFACTS_VOLUME_NAME,
                    path,
                    artifact.name.as_str(),
                ));
            }
        }

        if tmpl.is_script() {
            volumes.insert(empty_dir_volume(SCRIPT_VOLUME_NAME));
            let script_mount = mount(SCRIPT_VOLUME_NAME, SCRIPT_TEMPLATE_DIR);
            if let Some(staging) = staging.as_mut() {
                mounts_mut(staging).push(script_mount.clone());
            }
            mounts_mut(&mut main).push(script_mount);
        }

        inject_defaults(
            &mut tmpl.outputs.artifacts,
            &pod_name,
            self.ctx.name(),
            &config.artifact_repository,
        );

        let sidecars = compile_sidecars(&tmpl.sidecars, mounts_of(&main), &mut volumes, &self.ctx)?;

        let template_json = serde_json::to_string(&tmpl)?;
        let metadata = ObjectMeta::new(&pod_name, self.ctx.namespace())
            .with_label(LABEL_WORKFLOW, self.ctx.name())
            .with_label(LABEL_MANAGED_BY, LABEL_MANAGED_BY_WEFT)
            .with_annotation(ANNOTATION_NODE_NAME, self.node_name)
            .with_annotation(ANNOTATION_TEMPLATE, template_json)
            .with_owner(self.ctx.owner_reference());

        let mut unit = ExecutionUnit::new(metadata);
        unit.spec.init_containers = staging.into_iter().collect();
        unit.spec.containers = std::iter::once(wait)
            .chain(std::iter::once(main))
            .chain(sidecars)
            .collect();
        unit.spec.volumes = volumes.into_vec();

        debug!(
            pod = %pod_name,
            containers = unit.spec.containers.len(),
            init_containers = unit.spec.init_containers.len(),
            volumes = unit.spec.volumes.len(),
            "compiled pod"
        );

        Ok(unit)
    }
}

/// Build the payload role from the template's invocation
fn payload_role(tmpl: &Template) -> Result<Container, Error> {
    let mut main = match tmpl.invocation()? {
        Invocation::Container(container) => container.clone(),
        Invocation::Script(script) => Container {
            image: Some(script.image.clone()),
            command: Some(script.command.clone()),
            args: Some(vec![SCRIPT_TEMPLATE_SOURCE_PATH.to_string()]),
            volume_mounts: (!script.volume_mounts.is_empty())
                .then(|| script.volume_mounts.clone()),
            ..Default::default()
        },
    };
    main.name = MAIN_CONTAINER_NAME.to_string();
    Ok(main)
}

/// Check every input artifact and return their paths in declaration order.
///
/// Names must be unique and usable as a sub path, paths must be set, and
/// no two artifacts may land on overlapping paths.
fn validate_input_artifacts(artifacts: &[Artifact]) -> Result<Vec<&str>, Error> {
    let mut paths: Vec<&str> = Vec::with_capacity(artifacts.len());

    for (i, artifact) in artifacts.iter().enumerate() {
        let field = format!("inputs.artifacts.{}", artifact.name);
        if artifact.name.is_empty() || artifact.name.contains('/') {
            return Err(Error::bad_request_for_field(
                field,
                format!("invalid input artifact name '{}'", artifact.name),
            ));
        }
        // both would stage into the same sub path of the shared volume
        if artifacts[..i].iter().any(|a| a.name == artifact.name) {
            return Err(Error::bad_request_for_field(
                field,
                format!("duplicate input artifact name '{}'", artifact.name),
            ));
        }
        let path = artifact
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                Error::bad_request_for_field(
                    field.as_str(),
                    format!("input artifact '{}' did not specify a path", artifact.name),
                )
            })?;
        if let Some((other, _)) = artifacts
            .iter()
            .zip(&paths)
            .find(|(_, other_path)| paths_overlap(path, other_path))
        {
            return Err(Error::bad_request_for_field(
                field,
                format!(
                    "input artifact '{}' path {} overlaps input artifact '{}'",
                    artifact.name,
                    path,
                    other.name
                ),
            ));
        }
        paths.push(path);
    }

    Ok(paths)
}

/// Fail if a script template puts anything at or under the script directory.
///
/// The script volume is mounted there in both the staging and payload roles,
/// so a second mount at that path would be rejected by the API server.
fn check_script_dir_free(
    explicit_mounts: &[VolumeMount],
    artifacts: &[Artifact],
) -> Result<(), Error> {
    if let Some(m) = explicit_mounts
        .iter()
        .find(|m| is_nested_under(&m.mount_path, SCRIPT_TEMPLATE_DIR))
    {
        return Err(Error::bad_request_for_field(
            format!("volumeMounts.{}", m.name),
            format!(
                "mount path {} collides with the script directory {}",
                m.mount_path, SCRIPT_TEMPLATE_DIR
            ),
        ));
    }
    if let Some((artifact, path)) = artifacts.iter().find_map(|a| {
        a.path
            .as_deref()
            .filter(|p| !p.is_empty() && is_nested_under(p, SCRIPT_TEMPLATE_DIR))
            .map(|p| (a, p))
    }) {
        return Err(Error::bad_request_for_field(
            format!("inputs.artifacts.{}", artifact.name),
            format!(
                "input artifact '{}' path {} collides with the script directory {}",
                artifact.name, path, SCRIPT_TEMPLATE_DIR
            ),
        ));
    }
    Ok(())
}

/// Explicit payload mount as seen from the staging role
fn rerooted_mount(mount: &VolumeMount) -> VolumeMount {
    VolumeMount {
        mount_path: format!("{}{}", MAIN_CONTAINER_FS_PREFIX, mount.mount_path),
        ..mount.clone()
    }
}

/// Turn declared sidecars into containers.
///
/// Sidecars never get platform volumes. Mounts they declare themselves are
/// resolved like the payload's; mirrored payload mounts are already backed
/// by volumes in the set.
fn compile_sidecars(
    sidecars: &[Sidecar],
    main_mounts: &[VolumeMount],
    volumes: &mut VolumeSet,
    ctx: &WorkflowContext<'_>,
) -> Result<Vec<Container>, Error> {
    let mut compiled: Vec<Container> = Vec::with_capacity(sidecars.len());

    for sidecar in sidecars {
        let name = sidecar.container.name.as_str();
        let field = format!("sidecars.{}", name);
        if name.is_empty() {
            return Err(Error::bad_request_for_field(
                "sidecars",
                "sidecar name must be set",
            ));
        }
        if [INIT_CONTAINER_NAME, WAIT_CONTAINER_NAME, MAIN_CONTAINER_NAME].contains(&name) {
            return Err(Error::bad_request_for_field(
                field,
                format!("sidecar name '{}' is reserved", name),
            ));
        }
        if compiled.iter().any(|c| c.name == name) {
            return Err(Error::bad_request_for_field(
                field,
                format!("duplicate sidecar name '{}'", name),
            ));
        }

        let mut ctr = sidecar.container.clone();
        check_reserved_names(mounts_of(&ctr), &format!("{}.volumeMounts", field))?;
        volumes.add_references(mounts_of(&ctr), ctx)?;

        if sidecar.mirror_volume_mounts {
            for payload_mount in main_mounts {
                let own = mounts_mut(&mut ctr);
                if own.iter().any(|m| m.mount_path == payload_mount.mount_path) {
                    continue;
                }
                own.push(payload_mount.clone());
            }
        }
        compiled.push(ctr);
    }

    Ok(compiled)
}
