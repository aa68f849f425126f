//! Locating the update graph image before dispatch.
//!
//! The graph image is built locally rather than pulled from a registry.
//! When an update URL override promises one, it must already exist either
//! in the local content store or staged under the working directory. The
//! store is probed first so an already cached image is not re-pushed.

use airlift_core::{MirrorError, Result};

use crate::copier::ManifestProbe;
use crate::options::CopyOptions;
use crate::transform::{graph_staging_reference, local_graph_reference};

/// Resolve the reference the graph image should be copied from.
///
/// Fails hard when neither location holds the image; that is a
/// configuration problem, not a per-image copy failure.
pub async fn resolve_graph_image(
    probe: &dyn ManifestProbe,
    opts: &CopyOptions,
) -> Result<String> {
    let store_ref = local_graph_reference(opts);
    match probe.get_digest(&store_ref).await {
        Ok(digest) => {
            tracing::debug!(reference = %store_ref, %digest, "graph image found in local store");
            return Ok(store_ref);
        }
        Err(err) => {
            tracing::debug!(reference = %store_ref, error = %err, "graph image not in local store");
        }
    }

    let staging_ref = graph_staging_reference(opts);
    match probe.get_digest(&staging_ref).await {
        Ok(digest) => {
            tracing::debug!(reference = %staging_ref, %digest, "graph image found in staging");
            Ok(staging_ref)
        }
        Err(err) => Err(MirrorError::GraphImage(format!(
            "neither {store_ref} nor {staging_ref} holds the update graph image: {err}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Mode;
    use async_trait::async_trait;

    struct FixedProbe {
        store_ok: bool,
        staging_ok: bool,
    }

    #[async_trait]
    impl ManifestProbe for FixedProbe {
        async fn get_digest(&self, reference: &str) -> Result<String> {
            let ok = if reference.starts_with("docker://") {
                self.store_ok
            } else {
                self.staging_ok
            };
            if ok {
                Ok("sha256:ab12".to_string())
            } else {
                Err(MirrorError::Other(format!("no manifest at {reference}")))
            }
        }
    }

    fn opts() -> CopyOptions {
        let mut opts = CopyOptions::new(Mode::MirrorToDisk);
        opts.update_url_override = Some("https://updates.example.com/graph".to_string());
        opts
    }

    #[tokio::test]
    async fn test_local_store_wins() {
        let probe = FixedProbe {
            store_ok: true,
            staging_ok: true,
        };
        let resolved = resolve_graph_image(&probe, &opts()).await.unwrap();
        assert_eq!(resolved, "docker://localhost:55000/openshift/graph-image:latest");
    }

    #[tokio::test]
    async fn test_staging_fallback() {
        let probe = FixedProbe {
            store_ok: false,
            staging_ok: true,
        };
        let resolved = resolve_graph_image(&probe, &opts()).await.unwrap();
        assert_eq!(resolved, "oci://working-dir/graph-preparation");
    }

    #[tokio::test]
    async fn test_neither_location_fails_hard() {
        let probe = FixedProbe {
            store_ok: false,
            staging_ok: false,
        };
        let err = resolve_graph_image(&probe, &opts()).await.unwrap_err();
        assert!(matches!(err, MirrorError::GraphImage(_)));
    }
}
