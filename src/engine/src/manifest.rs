//! Manifest digest probing for registry and OCI-layout references.

use std::path::Path;

use async_trait::async_trait;
use oci_distribution::client::ClientConfig;
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};

use airlift_core::{MirrorError, Result};

use crate::copier::ManifestProbe;
use crate::reference::{strip_scheme, Scheme};
use crate::registry::{map_registry_error, RegistryAuth};

/// Digest probe backed by the registry client for `docker://` references
/// and by the layout index for `oci://` and `file://` references.
pub struct OciManifestProbe {
    client: Client,
    auth: RegistryAuth,
}

impl OciManifestProbe {
    pub fn new() -> Self {
        Self::with_auth(RegistryAuth::anonymous())
    }

    pub fn with_auth(auth: RegistryAuth) -> Self {
        Self {
            client: Client::new(ClientConfig::default()),
            auth,
        }
    }

    async fn registry_digest(&self, reference: &str) -> Result<String> {
        let parsed: Reference = strip_scheme(reference).parse().map_err(|e| {
            MirrorError::InvalidReference {
                reference: reference.to_string(),
                message: format!("{e}"),
            }
        })?;
        let auth: OciRegistryAuth = (&self.auth).into();
        self.client
            .fetch_manifest_digest(&parsed, &auth)
            .await
            .map_err(map_registry_error)
    }
}

impl Default for OciManifestProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ManifestProbe for OciManifestProbe {
    async fn get_digest(&self, reference: &str) -> Result<String> {
        match Scheme::of(reference) {
            Some(Scheme::Docker) => self.registry_digest(reference).await,
            Some(Scheme::Oci) | Some(Scheme::File) => {
                layout_digest(Path::new(strip_scheme(reference)))
            }
            None => Err(MirrorError::InvalidReference {
                reference: reference.to_string(),
                message: "missing scheme prefix".to_string(),
            }),
        }
    }
}

/// First manifest digest recorded in an OCI image layout's `index.json`.
pub fn layout_digest(dir: &Path) -> Result<String> {
    let index_path = dir.join("index.json");
    let raw = std::fs::read_to_string(&index_path).map_err(|e| {
        MirrorError::GraphImage(format!("cannot read {}: {}", index_path.display(), e))
    })?;
    let index: serde_json::Value = serde_json::from_str(&raw)?;
    index["manifests"]
        .get(0)
        .and_then(|m| m["digest"].as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            MirrorError::GraphImage(format!(
                "{} lists no manifests",
                index_path.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_layout(dir: &Path, digest: &str) {
        std::fs::write(
            dir.join("index.json"),
            format!(
                r#"{{"schemaVersion":2,"manifests":[{{"mediaType":"application/vnd.oci.image.manifest.v1+json","digest":"{digest}","size":7143}}]}}"#
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_layout_digest() {
        let tmp = TempDir::new().unwrap();
        write_layout(tmp.path(), "sha256:ab12");
        assert_eq!(layout_digest(tmp.path()).unwrap(), "sha256:ab12");
    }

    #[test]
    fn test_layout_digest_missing_index() {
        let tmp = TempDir::new().unwrap();
        assert!(layout_digest(tmp.path()).is_err());
    }

    #[test]
    fn test_layout_digest_empty_manifest_list() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("index.json"),
            r#"{"schemaVersion":2,"manifests":[]}"#,
        )
        .unwrap();
        assert!(layout_digest(tmp.path()).is_err());
    }

    #[tokio::test]
    async fn test_oci_scheme_reads_layout() {
        let tmp = TempDir::new().unwrap();
        write_layout(tmp.path(), "sha256:cd34");
        let probe = OciManifestProbe::new();
        let reference = format!("oci://{}", tmp.path().display());
        assert_eq!(probe.get_digest(&reference).await.unwrap(), "sha256:cd34");
    }

    #[tokio::test]
    async fn test_unqualified_reference_rejected() {
        let probe = OciManifestProbe::new();
        assert!(probe.get_digest("quay.io/ns/img:1").await.is_err());
    }
}
