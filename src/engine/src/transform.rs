//! Mode-aware reference rewriting applied before dispatch.
//!
//! For each image the transformer yields the effective source and
//! destination handed to the copy primitive, keyed by (mode, role). The
//! image's origin is never touched; it stays the canonical upstream
//! reference used for identity and the bundle lookup tables.

use airlift_core::Result;

use crate::options::{CopyOptions, Mode};
use crate::reference::{ImageReference, DOCKER_PROTOCOL, OCI_PROTOCOL};
use crate::schema::{CopyImageSchema, ImageKind};

/// Repository for release component images at the destination.
pub const RELEASE_COMPONENT_REPOSITORY: &str = "openshift/release";
/// Repository for the release payload image at the destination.
pub const RELEASE_IMAGES_REPOSITORY: &str = "openshift/release-images";
/// Repository and tag of the update graph image.
pub const GRAPH_IMAGE_REPOSITORY: &str = "openshift/graph-image";
pub const GRAPH_IMAGE_TAG: &str = "latest";
/// Directory under the workspace where a locally built graph image is
/// staged as an OCI layout.
pub const GRAPH_PREPARATION_DIR: &str = "graph-preparation";

/// Effective (source, destination) for one image under the run's mode.
pub fn prepare(image: &CopyImageSchema, opts: &CopyOptions) -> Result<(String, String)> {
    match opts.mode {
        Mode::MirrorToDisk => {
            let dest = if image.kind == ImageKind::CincinnatiGraph {
                // Cached under its well-known name so a later
                // disk-to-mirror run can find it.
                local_graph_reference(opts)
            } else {
                cache_reference(image, opts)?
            };
            Ok((image.source.clone(), dest))
        }
        Mode::DiskToMirror => {
            let src = if image.kind == ImageKind::CincinnatiGraph {
                local_graph_reference(opts)
            } else {
                cache_reference(image, opts)?
            };
            Ok((src, destination_reference(image, opts)?))
        }
        Mode::MirrorToMirror => {
            let src = if image.kind == ImageKind::CincinnatiGraph {
                graph_staging_reference(opts)
            } else {
                image.source.clone()
            };
            Ok((src, destination_reference(image, opts)?))
        }
    }
}

/// Content-addressed reference in the local store for `image`'s origin.
pub fn cache_reference(image: &CopyImageSchema, opts: &CopyOptions) -> Result<String> {
    let parsed = ImageReference::parse(&image.origin)?;
    Ok(format!(
        "{}{}/{}:{}",
        DOCKER_PROTOCOL,
        opts.local_store_fqdn,
        parsed.repository,
        parsed.tag_or_digest_tag()
    ))
}

/// The graph image staged as an OCI layout under the workspace.
pub fn graph_staging_reference(opts: &CopyOptions) -> String {
    format!(
        "{}{}/{}",
        OCI_PROTOCOL,
        opts.workspace_dir.display(),
        GRAPH_PREPARATION_DIR
    )
}

/// The graph image as cached in the local store registry.
pub fn local_graph_reference(opts: &CopyOptions) -> String {
    format!(
        "{}{}/{}:{}",
        DOCKER_PROTOCOL, opts.local_store_fqdn, GRAPH_IMAGE_REPOSITORY, GRAPH_IMAGE_TAG
    )
}

/// Destination reference for `image` under the per-role path templates.
pub fn destination_reference(image: &CopyImageSchema, opts: &CopyOptions) -> Result<String> {
    let base = destination_base(opts);
    let parsed = ImageReference::parse(&image.origin)?;
    let version = if opts.release_tag.is_empty() {
        parsed.tag_or_digest_tag()
    } else {
        opts.release_tag.clone()
    };
    Ok(match image.kind {
        ImageKind::OcpRelease => {
            format!("{base}/{RELEASE_IMAGES_REPOSITORY}:{version}")
        }
        ImageKind::OcpReleaseContent => {
            format!(
                "{base}/{RELEASE_COMPONENT_REPOSITORY}:{version}-{}",
                parsed.component()
            )
        }
        ImageKind::CincinnatiGraph => {
            format!("{base}/{GRAPH_IMAGE_REPOSITORY}:{GRAPH_IMAGE_TAG}")
        }
        _ => format!(
            "{base}/{}:{}",
            parsed.repository,
            parsed.tag_or_digest_tag()
        ),
    })
}

fn destination_base(opts: &CopyOptions) -> String {
    let raw = opts.destination.trim_end_matches('/');
    if raw.starts_with(DOCKER_PROTOCOL) {
        raw.to_string()
    } else {
        format!("{DOCKER_PROTOCOL}{raw}")
    }
}
