//! Default artifact repository addressing
//!
//! Output artifacts that don't name a location get one in the controller's
//! default repository. Keys are derived from the workflow, unit and artifact
//! names only, so recompiling the same step always addresses the same object.

use tracing::debug;

use weft_common::config::ArtifactRepository;
use weft_common::crd::{Artifact, S3Artifact};

/// Object key for an output artifact: `[prefix/]workflow/unit/artifact`
pub fn artifact_key(
    prefix: Option<&str>,
    workflow_name: &str,
    unit_name: &str,
    artifact_name: &str,
) -> String {
    match prefix.map(|p| p.trim_end_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!(
            "{}/{}/{}/{}",
            prefix, workflow_name, unit_name, artifact_name
        ),
        None => format!("{}/{}/{}", workflow_name, unit_name, artifact_name),
    }
}

/// Fill in a default location for every artifact without one.
///
/// Artifacts with an explicit location are left untouched. Without a
/// configured repository nothing changes; whether a missing location is an
/// error is decided by whoever saves the artifact.
pub fn inject_defaults(
    artifacts: &mut [Artifact],
    unit_name: &str,
    workflow_name: &str,
    repo: &ArtifactRepository,
) {
    let Some(s3) = &repo.s3 else {
        return;
    };

    for artifact in artifacts.iter_mut().filter(|a| !a.has_location()) {
        let key = artifact_key(
            s3.key_prefix.as_deref(),
            workflow_name,
            unit_name,
            &artifact.name,
        );
        debug!(
            workflow = %workflow_name,
            pod = %unit_name,
            artifact = %artifact.name,
            bucket = %s3.bucket,
            key = %key,
            "injecting default artifact location"
        );
        artifact.s3 = Some(S3Artifact {
            bucket: s3.bucket.clone(),
            key,
            endpoint: s3.endpoint.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_common::config::S3ArtifactRepository;
    use weft_common::crd::GitArtifact;

    fn repo(prefix: Option<&str>) -> ArtifactRepository {
        ArtifactRepository {
            s3: Some(S3ArtifactRepository {
                bucket: "my-bucket".to_string(),
                endpoint: Some("s3.amazonaws.com".to_string()),
                key_prefix: prefix.map(str::to_string),
            }),
        }
    }

    #[test]
    fn key_includes_prefix_when_set() {
        assert_eq!(
            artifact_key(Some("store"), "wf", "wf-abc", "result"),
            "store/wf/wf-abc/result"
        );
        assert_eq!(
            artifact_key(Some("store/"), "wf", "wf-abc", "result"),
            "store/wf/wf-abc/result"
        );
    }

    #[test]
    fn key_without_prefix_starts_at_workflow() {
        assert_eq!(artifact_key(None, "wf", "wf-abc", "result"), "wf/wf-abc/result");
        assert_eq!(artifact_key(Some(""), "wf", "wf-abc", "result"), "wf/wf-abc/result");
    }

    #[test]
    fn missing_locations_are_filled_from_repository() {
        let mut artifacts = vec![Artifact::new("result", "/tmp/result")];
        inject_defaults(&mut artifacts, "wf-abc", "wf", &repo(Some("store")));

        let s3 = artifacts[0].s3.as_ref().unwrap();
        assert_eq!(s3.bucket, "my-bucket");
        assert_eq!(s3.key, "store/wf/wf-abc/result");
        assert_eq!(s3.endpoint.as_deref(), Some("s3.amazonaws.com"));
    }

    #[test]
    fn explicit_locations_are_untouched() {
        let mut explicit_s3 = Artifact::new("model", "/out/model");
        explicit_s3.s3 = Some(S3Artifact {
            bucket: "elsewhere".to_string(),
            key: "models/latest".to_string(),
            endpoint: None,
        });
        let mut explicit_git = Artifact::new("repo", "/out/repo");
        explicit_git.git = Some(GitArtifact {
            repo: "https://example.com/repo.git".to_string(),
            revision: None,
        });
        let before = vec![explicit_s3, explicit_git];

        let mut after = before.clone();
        inject_defaults(&mut after, "wf-abc", "wf", &repo(Some("store")));
        assert_eq!(before, after);
    }

    #[test]
    fn no_repository_leaves_artifacts_without_location() {
        let mut artifacts = vec![Artifact::new("result", "/tmp/result")];
        inject_defaults(&mut artifacts, "wf-abc", "wf", &ArtifactRepository::default());
        assert!(!artifacts[0].has_location());
    }
}
