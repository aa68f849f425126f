//! Concrete copy primitive over the registry client.
//!
//! Moves one image between any pairing of registry (`docker://`) and
//! on-disk OCI layout (`oci://`, `file://`) endpoints. Blobs land in a
//! staging directory first and are renamed into place so concurrent
//! copies of distinct images cannot corrupt each other.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, Config, ImageLayer};
use oci_distribution::manifest::{OciImageManifest, OciManifest};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};

use airlift_core::{MirrorError, RegistryErrorCode, Result};

use crate::copier::{CancelSignal, ImageCopier};
use crate::options::{CopyOptions, Mode};
use crate::reference::{strip_scheme, Scheme};

/// Registry credentials.
#[derive(Debug, Clone, Default)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Credentials from `REGISTRY_USERNAME` / `REGISTRY_PASSWORD`, falling
    /// back to anonymous.
    pub fn from_env() -> Self {
        match (
            std::env::var("REGISTRY_USERNAME").ok(),
            std::env::var("REGISTRY_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Self::basic(username, password),
            _ => Self::anonymous(),
        }
    }
}

impl From<&RegistryAuth> for OciRegistryAuth {
    fn from(auth: &RegistryAuth) -> Self {
        match (&auth.username, &auth.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Map a registry client error onto the codes the journal records.
pub fn map_registry_error(err: impl std::fmt::Display) -> MirrorError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    let code = if lowered.contains("unauthorized") || lowered.contains("authentication") {
        RegistryErrorCode::Unauthorized
    } else if lowered.contains("denied") {
        RegistryErrorCode::Denied
    } else if lowered.contains("manifest unknown") || lowered.contains("manifest_unknown") {
        RegistryErrorCode::ManifestUnknown
    } else if lowered.contains("blob unknown") || lowered.contains("blob_unknown") {
        RegistryErrorCode::BlobUnknown
    } else if lowered.contains("name unknown")
        || lowered.contains("name_unknown")
        || lowered.contains("repository not found")
    {
        RegistryErrorCode::NameUnknown
    } else if lowered.contains("too many requests") || lowered.contains("429") {
        RegistryErrorCode::TooManyRequests
    } else {
        RegistryErrorCode::Unknown
    };
    MirrorError::Registry { code, message }
}

/// One image pulled into memory: manifest plus its blobs.
struct ImagePayload {
    manifest: OciImageManifest,
    manifest_digest: String,
    config_data: Vec<u8>,
    layers: Vec<ImageLayer>,
}

/// Copy primitive over the registry client.
pub struct RegistryCopier {
    client: Client,
    auth: RegistryAuth,
    retries: u32,
}

impl RegistryCopier {
    pub fn new() -> Self {
        Self::with_auth(RegistryAuth::anonymous())
    }

    pub fn with_auth(auth: RegistryAuth) -> Self {
        Self {
            client: Client::new(ClientConfig::default()),
            auth,
            retries: 3,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    async fn copy_once(&self, src: &str, dest: &str) -> Result<()> {
        let payload = match Scheme::of(src) {
            Some(Scheme::Docker) => self.pull_payload(src).await?,
            Some(Scheme::Oci) | Some(Scheme::File) => {
                load_layout(Path::new(strip_scheme(src)))?
            }
            None => {
                return Err(MirrorError::InvalidReference {
                    reference: src.to_string(),
                    message: "missing scheme prefix".to_string(),
                })
            }
        };

        match Scheme::of(dest) {
            Some(Scheme::Docker) => self.push_payload(dest, payload).await,
            Some(Scheme::Oci) | Some(Scheme::File) => {
                write_layout(Path::new(strip_scheme(dest)), &payload)
            }
            None => Err(MirrorError::InvalidReference {
                reference: dest.to_string(),
                message: "missing scheme prefix".to_string(),
            }),
        }
    }

    async fn pull_payload(&self, src: &str) -> Result<ImagePayload> {
        let reference = parse_docker_reference(src)?;
        let auth: OciRegistryAuth = (&self.auth).into();

        let (manifest, manifest_digest) = self
            .client
            .pull_manifest(&reference, &auth)
            .await
            .map_err(map_registry_error)?;
        let manifest = match manifest {
            OciManifest::Image(manifest) => manifest,
            OciManifest::ImageIndex(_) => {
                return Err(MirrorError::Registry {
                    code: RegistryErrorCode::ManifestUnknown,
                    message: format!("{src} resolves to an index, expected a single manifest"),
                })
            }
        };

        let mut config_data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&reference, &manifest.config, &mut config_data)
            .await
            .map_err(map_registry_error)?;

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for descriptor in &manifest.layers {
            tracing::debug!(digest = %descriptor.digest, size = descriptor.size, "pulling layer");
            let mut data: Vec<u8> = Vec::new();
            self.client
                .pull_blob(&reference, descriptor, &mut data)
                .await
                .map_err(map_registry_error)?;
            layers.push(ImageLayer::new(
                data,
                descriptor.media_type.clone(),
                descriptor.annotations.clone(),
            ));
        }

        Ok(ImagePayload {
            manifest,
            manifest_digest,
            config_data,
            layers,
        })
    }

    async fn push_payload(&self, dest: &str, payload: ImagePayload) -> Result<()> {
        let reference = parse_docker_reference(dest)?;
        let auth: OciRegistryAuth = (&self.auth).into();
        let config = Config::new(
            payload.config_data,
            payload.manifest.config.media_type.clone(),
            payload.manifest.config.annotations.clone(),
        );
        self.client
            .push(
                &reference,
                &payload.layers,
                config,
                &auth,
                Some(payload.manifest),
            )
            .await
            .map(|_| ())
            .map_err(map_registry_error)
    }
}

impl Default for RegistryCopier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageCopier for RegistryCopier {
    async fn run(
        &self,
        mut cancel: CancelSignal,
        src: &str,
        dest: &str,
        _mode: Mode,
        opts: &CopyOptions,
    ) -> Result<()> {
        let mut attempt = 0;
        loop {
            if *cancel.borrow() {
                return Err(MirrorError::Cancelled);
            }
            let result = tokio::select! {
                result = self.copy_once(src, dest) => result,
                _ = crate::copier::cancelled(&mut cancel) => Err(MirrorError::Cancelled),
            };
            match result {
                Ok(()) => {
                    tracing::info!(src, dest, function = %opts.function, "image copied");
                    return Ok(());
                }
                Err(err) => {
                    let transient = err
                        .registry_code()
                        .map(|code| code.is_transient())
                        .unwrap_or(false);
                    if transient && attempt < self.retries {
                        attempt += 1;
                        let delay = Duration::from_millis(500 * (1u64 << attempt));
                        tracing::warn!(src, attempt, error = %err, "transient failure, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn check(&self, image: &str, _opts: &CopyOptions, _as_copy_src: bool) -> Result<bool> {
        match Scheme::of(image) {
            Some(Scheme::Docker) => {
                let reference = parse_docker_reference(image)?;
                let auth: OciRegistryAuth = (&self.auth).into();
                match self.client.fetch_manifest_digest(&reference, &auth).await {
                    Ok(_) => Ok(true),
                    Err(err) => match map_registry_error(err) {
                        MirrorError::Registry { code, .. }
                            if matches!(
                                code,
                                RegistryErrorCode::ManifestUnknown
                                    | RegistryErrorCode::NameUnknown
                            ) =>
                        {
                            Ok(false)
                        }
                        other => Err(other),
                    },
                }
            }
            Some(Scheme::Oci) | Some(Scheme::File) => {
                Ok(Path::new(strip_scheme(image)).join("index.json").exists())
            }
            None => Err(MirrorError::InvalidReference {
                reference: image.to_string(),
                message: "missing scheme prefix".to_string(),
            }),
        }
    }
}

fn parse_docker_reference(reference: &str) -> Result<Reference> {
    strip_scheme(reference)
        .parse()
        .map_err(|e| MirrorError::InvalidReference {
            reference: reference.to_string(),
            message: format!("{e}"),
        })
}

/// Load an image from an OCI layout directory.
fn load_layout(dir: &Path) -> Result<ImagePayload> {
    let manifest_digest = crate::manifest::layout_digest(dir)?;
    let manifest_raw = std::fs::read_to_string(blob_path(dir, &manifest_digest))?;
    let manifest: OciImageManifest = serde_json::from_str(&manifest_raw)?;

    let config_data = std::fs::read(blob_path(dir, &manifest.config.digest))?;
    let mut layers = Vec::with_capacity(manifest.layers.len());
    for descriptor in &manifest.layers {
        let data = std::fs::read(blob_path(dir, &descriptor.digest))?;
        layers.push(ImageLayer::new(
            data,
            descriptor.media_type.clone(),
            descriptor.annotations.clone(),
        ));
    }

    Ok(ImagePayload {
        manifest,
        manifest_digest,
        config_data,
        layers,
    })
}

/// Write an image as an OCI layout, staging first and renaming into place.
fn write_layout(dir: &Path, payload: &ImagePayload) -> Result<()> {
    let staging = staging_dir(dir);
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    let blobs_dir = staging.join("blobs").join("sha256");
    std::fs::create_dir_all(&blobs_dir)?;

    let manifest_json = serde_json::to_vec(&payload.manifest)?;
    std::fs::write(
        blobs_dir.join(digest_hex(&payload.manifest_digest)),
        &manifest_json,
    )?;
    std::fs::write(
        blobs_dir.join(digest_hex(&payload.manifest.config.digest)),
        &payload.config_data,
    )?;
    for (descriptor, layer) in payload.manifest.layers.iter().zip(&payload.layers) {
        std::fs::write(blobs_dir.join(digest_hex(&descriptor.digest)), &layer.data)?;
    }

    std::fs::write(
        staging.join("oci-layout"),
        r#"{"imageLayoutVersion":"1.0.0"}"#,
    )?;
    let index = serde_json::json!({
        "schemaVersion": 2,
        "manifests": [{
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "digest": payload.manifest_digest,
            "size": manifest_json.len(),
        }]
    });
    std::fs::write(
        staging.join("index.json"),
        serde_json::to_string_pretty(&index)?,
    )?;

    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    if let Some(parent) = dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&staging, dir)?;
    Ok(())
}

fn staging_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layout".to_string());
    dir.with_file_name(format!(".{name}.staging"))
}

fn blob_path(dir: &Path, digest: &str) -> PathBuf {
    dir.join("blobs").join("sha256").join(digest_hex(digest))
}

fn digest_hex(digest: &str) -> &str {
    digest.strip_prefix("sha256:").unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_from_parts() {
        let anonymous = RegistryAuth::anonymous();
        assert!(matches!(
            OciRegistryAuth::from(&anonymous),
            OciRegistryAuth::Anonymous
        ));

        let basic = RegistryAuth::basic("user", "pass");
        assert!(matches!(
            OciRegistryAuth::from(&basic),
            OciRegistryAuth::Basic(_, _)
        ));
    }

    #[test]
    fn test_map_registry_error_codes() {
        let cases = [
            ("401 Unauthorized", RegistryErrorCode::Unauthorized),
            ("requested access to the resource is denied", RegistryErrorCode::Denied),
            ("manifest unknown to registry", RegistryErrorCode::ManifestUnknown),
            ("blob unknown to registry", RegistryErrorCode::BlobUnknown),
            ("name unknown: repository not found", RegistryErrorCode::NameUnknown),
            ("too many requests", RegistryErrorCode::TooManyRequests),
            ("connection reset by peer", RegistryErrorCode::Unknown),
        ];
        for (message, expected) in cases {
            let err = map_registry_error(message);
            assert_eq!(err.registry_code(), Some(expected), "{message}");
        }
    }

    #[test]
    fn test_staging_dir_is_sibling() {
        let staging = staging_dir(Path::new("/store/graph-preparation"));
        assert_eq!(staging, Path::new("/store/.graph-preparation.staging"));
    }

    #[test]
    fn test_digest_hex() {
        assert_eq!(digest_hex("sha256:ab12"), "ab12");
        assert_eq!(digest_hex("ab12"), "ab12");
    }

    #[tokio::test]
    async fn test_check_layout_without_index() {
        let tmp = tempfile::TempDir::new().unwrap();
        let copier = RegistryCopier::new();
        let opts = CopyOptions::new(Mode::MirrorToDisk);
        let reference = format!("oci://{}", tmp.path().display());
        assert!(!copier.check(&reference, &opts, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_run_rejects_unqualified_reference() {
        let copier = RegistryCopier::new();
        let opts = CopyOptions::new(Mode::MirrorToMirror);
        let (_tx, cancel) = crate::copier::cancellation();
        let err = copier
            .run(cancel, "quay.io/ns/img:1", "docker://dest/ns/img:1", opts.mode, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::InvalidReference { .. }));
    }
}
