//! Volume resolution and mount overlap detection
//!
//! Templates mount volumes by name. Names resolve against the workflow's
//! declared volumes first, then against claims recorded in its status.
//!
//! An input artifact whose path overlaps an explicit mount must not be bound
//! through the shared artifacts emptyDir: the explicit mount would shadow it,
//! and anything staging wrote there would be invisible once the payload
//! starts. Staging writes into the user's volume instead.

use std::path::Path;

use weft_common::k8s::{
    downward_api_volume, host_dir_volume, mount, readonly_mount, Volume, VolumeMount,
};
use weft_common::{
    Error, DOCKER_LIB_HOST_PATH, DOCKER_LIB_VOLUME_NAME, INPUT_ARTIFACTS_VOLUME_NAME,
    POD_METADATA_ANNOTATIONS_FILE, POD_METADATA_MOUNT_PATH, POD_METADATA_VOLUME_NAME,
    SCRIPT_VOLUME_NAME,
};

use crate::context::WorkflowContext;

/// Volume names the platform attaches itself; templates can't reuse them
pub const RESERVED_VOLUME_NAMES: [&str; 4] = [
    POD_METADATA_VOLUME_NAME,
    DOCKER_LIB_VOLUME_NAME,
    INPUT_ARTIFACTS_VOLUME_NAME,
    SCRIPT_VOLUME_NAME,
];

// =============================================================================
// Platform volumes
// =============================================================================

/// Pod annotations (including the resolved template) exposed as a file
pub fn pod_metadata_volume() -> Volume {
    downward_api_volume(
        POD_METADATA_VOLUME_NAME,
        POD_METADATA_ANNOTATIONS_FILE,
        "metadata.annotations",
    )
}

/// Mount of the pod metadata volume for staging and monitor roles
pub fn pod_metadata_mount() -> VolumeMount {
    mount(POD_METADATA_VOLUME_NAME, POD_METADATA_MOUNT_PATH)
}

/// Host container runtime storage, so the monitor can find payload logs and output
pub fn docker_lib_volume() -> Volume {
    host_dir_volume(DOCKER_LIB_VOLUME_NAME, DOCKER_LIB_HOST_PATH)
}

/// Read-only mount of the runtime storage for the monitor role
pub fn docker_lib_mount() -> VolumeMount {
    readonly_mount(DOCKER_LIB_VOLUME_NAME, DOCKER_LIB_HOST_PATH)
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve a volume reference against the workflow.
///
/// Declared volumes win over recorded claims. An unknown name is a
/// bad request: the template references something the workflow never declared.
pub fn resolve_volume<'a>(name: &str, ctx: &WorkflowContext<'a>) -> Result<&'a Volume, Error> {
    ctx.volumes()
        .iter()
        .chain(ctx.claims().iter())
        .find(|v| v.name == name)
        .ok_or_else(|| {
            Error::bad_request_for_field(
                format!("volumeMounts.{}", name),
                format!("volume '{}' not found in workflow spec", name),
            )
        })
}

/// Ordered set of pod volumes, unique by name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VolumeSet {
    volumes: Vec<Volume>,
}

impl VolumeSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a volume with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.volumes.iter().any(|v| v.name == name)
    }

    /// Append a volume unless one with the same name is already present.
    ///
    /// Returns true if the volume was added.
    pub fn insert(&mut self, volume: Volume) -> bool {
        if self.contains(&volume.name) {
            return false;
        }
        self.volumes.push(volume);
        true
    }

    /// Resolve and add every volume referenced by `mounts`, in order.
    ///
    /// Names already in the set are skipped. Fails on the first reference
    /// that doesn't resolve; callers discard the whole set in that case.
    pub fn add_references(
        &mut self,
        mounts: &[VolumeMount],
        ctx: &WorkflowContext<'_>,
    ) -> Result<(), Error> {
        for mount in mounts {
            if self.contains(&mount.name) {
                continue;
            }
            let volume = resolve_volume(&mount.name, ctx)?;
            self.volumes.push(volume.clone());
        }
        Ok(())
    }

    /// Volumes in insertion order
    pub fn as_slice(&self) -> &[Volume] {
        &self.volumes
    }

    /// Consume the set, returning volumes in insertion order
    pub fn into_vec(self) -> Vec<Volume> {
        self.volumes
    }
}

/// Fail if any mount references a platform volume name
pub fn check_reserved_names(mounts: &[VolumeMount], field: &str) -> Result<(), Error> {
    match mounts
        .iter()
        .find(|m| RESERVED_VOLUME_NAMES.contains(&m.name.as_str()))
    {
        Some(mount) => Err(Error::bad_request_for_field(
            format!("{}.{}", field, mount.name),
            format!("volume name '{}' is reserved", mount.name),
        )),
        None => Ok(()),
    }
}

// =============================================================================
// Overlap
// =============================================================================

/// Whether `path` equals `base` or lies under it.
///
/// Compares whole path components, so `/src2` is not under `/src`.
pub fn is_nested_under(path: &str, base: &str) -> bool {
    Path::new(path).starts_with(Path::new(base))
}

/// Whether either path contains the other
pub fn paths_overlap(a: &str, b: &str) -> bool {
    is_nested_under(a, b) || is_nested_under(b, a)
}

/// First explicit mount that `path` would be shadowed by, in declaration order
pub fn find_overlap<'m>(mounts: &'m [VolumeMount], path: &str) -> Option<&'m VolumeMount> {
    mounts.iter().find(|m| is_nested_under(path, &m.mount_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_common::crd::{Workflow, WorkflowSpec, WorkflowStatus};
    use weft_common::k8s::{pvc_volume, sub_path_mount};
    use weft_common::{ControllerConfig, ErrorKind};

    fn workflow() -> Workflow {
        let spec = WorkflowSpec {
            volumes: vec![
                pvc_volume("data-vol", "data"),
                serde_json::from_value(serde_json::json!({
                    "name": "settings",
                    "nfs": {"server": "nfs.example.com", "path": "/exports/settings"}
                }))
                .unwrap(),
            ],
            ..Default::default()
        };
        let mut wf = Workflow::new("wf", spec);
        wf.metadata.namespace = Some("default".to_string());
        wf.metadata.uid = Some("uid-1".to_string());
        wf.status = Some(WorkflowStatus {
            persistent_volume_claims: vec![
                pvc_volume("workdir", "wf-workdir"),
                pvc_volume("data-vol", "shadowed-claim"),
            ],
            message: None,
        });
        wf
    }

    fn config() -> ControllerConfig {
        ControllerConfig {
            executor_image: "weft/executor:v1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn overlap_is_reflexive_and_prefix_based() {
        let mounts = vec![mount("data-vol", "/src")];
        assert!(find_overlap(&mounts, "/src").is_some());
        assert!(find_overlap(&mounts, "/src/sub").is_some());
        assert!(find_overlap(&mounts, "/srcx").is_none());
        assert!(find_overlap(&mounts, "/src2").is_none());
        assert!(find_overlap(&mounts, "/").is_none());
    }

    #[test]
    fn overlap_ignores_trailing_slashes() {
        let mounts = vec![mount("data-vol", "/src/")];
        assert!(find_overlap(&mounts, "/src").is_some());
        assert!(find_overlap(&mounts, "/src/a/").is_some());
    }

    #[test]
    fn root_mount_overlaps_everything() {
        let mounts = vec![mount("root", "/")];
        assert!(find_overlap(&mounts, "/anything/at/all").is_some());
    }

    #[test]
    fn first_overlap_in_declaration_order_wins() {
        let mounts = vec![
            mount("outer", "/data"),
            mount("inner", "/data/in"),
        ];
        assert_eq!(find_overlap(&mounts, "/data/in/x").unwrap().name, "outer");

        let reversed = vec![
            mount("inner", "/data/in"),
            mount("outer", "/data"),
        ];
        assert_eq!(find_overlap(&reversed, "/data/in/x").unwrap().name, "inner");
    }

    #[test]
    fn paths_overlap_is_symmetric() {
        assert!(paths_overlap("/a", "/a/b"));
        assert!(paths_overlap("/a/b", "/a"));
        assert!(!paths_overlap("/a", "/ab"));
    }

    #[test]
    fn declared_volumes_win_over_claims() {
        let cfg = config();
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf, &cfg).unwrap();
        let vol = resolve_volume("data-vol", &ctx).unwrap();
        assert_eq!(
            vol.persistent_volume_claim.as_ref().unwrap().claim_name,
            "data"
        );
    }

    #[test]
    fn claims_resolve_when_not_declared() {
        let cfg = config();
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf, &cfg).unwrap();
        let vol = resolve_volume("workdir", &ctx).unwrap();
        assert_eq!(
            vol.persistent_volume_claim.as_ref().unwrap().claim_name,
            "wf-workdir"
        );
    }

    #[test]
    fn unknown_volume_is_bad_request() {
        let cfg = config();
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf, &cfg).unwrap();
        let err = resolve_volume("nope", &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.to_string().contains("'nope'"));
    }

    #[test]
    fn volume_set_dedupes_references() {
        let cfg = config();
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf, &cfg).unwrap();
        let mut set = VolumeSet::new();
        set.insert(pod_metadata_volume());
        set.add_references(
            &[
                mount("data-vol", "/a"),
                mount("settings", "/etc/settings"),
                sub_path_mount("data-vol", "/b", "b"),
            ],
            &ctx,
        )
        .unwrap();
        let names: Vec<&str> = set.as_slice().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["podmetadata", "data-vol", "settings"]);
        assert_eq!(
            set.as_slice()[2].nfs.as_ref().map(|n| n.server.as_str()),
            Some("nfs.example.com")
        );
    }

    #[test]
    fn volume_set_fails_on_unresolved_reference() {
        let cfg = config();
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf, &cfg).unwrap();
        let mut set = VolumeSet::new();
        let err = set
            .add_references(&[mount("missing", "/m")], &ctx)
            .unwrap_err();
        assert_eq!(err.field(), Some("volumeMounts.missing"));
    }

    #[test]
    fn reserved_names_are_rejected() {
        let err = check_reserved_names(&[mount("input-artifacts", "/x")], "container.volumeMounts")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(check_reserved_names(&[mount("data-vol", "/x")], "container.volumeMounts").is_ok());
    }

    #[test]
    fn platform_volumes_are_fresh_values() {
        let mut first = pod_metadata_volume();
        first.name = "mutated".to_string();
        assert_eq!(pod_metadata_volume().name, POD_METADATA_VOLUME_NAME);
        assert_eq!(docker_lib_mount().read_only, Some(true));
        assert_eq!(
            docker_lib_volume().host_path.unwrap().path,
            DOCKER_LIB_HOST_PATH
        );
    }
}
