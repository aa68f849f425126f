//! Builds the mirror plan from the image set configuration.
//!
//! The full collectors resolve release payloads and walk catalog contents
//! upstream of the engine. This planner maps the configuration's explicit
//! entries into a plan so a run has work to dispatch: release channels,
//! the update graph image, operator catalogs, and additional images.

use airlift_engine::reference::DOCKER_PROTOCOL;
use airlift_engine::transform::graph_staging_reference;
use airlift_engine::{CollectorSchema, CopyImageSchema, CopyImageSchemaMap, CopyOptions, ImageKind};

use airlift_core::config::ImageSetConfig;

/// Upstream repository of OpenShift release payloads.
const RELEASE_UPSTREAM: &str = "quay.io/openshift-release-dev/ocp-release";

/// Map configuration entries into a mirror plan.
pub fn build_plan(config: &ImageSetConfig, opts: &CopyOptions) -> CollectorSchema {
    let mut images = Vec::new();
    let mirror = &config.mirror;

    for channel in &mirror.platform.channels {
        let version = channel
            .max_version
            .as_deref()
            .or(channel.min_version.as_deref())
            .unwrap_or("latest");
        let reference = format!("{DOCKER_PROTOCOL}{RELEASE_UPSTREAM}:{version}-x86_64");
        images.push(CopyImageSchema {
            source: reference.clone(),
            destination: reference.clone(),
            origin: reference,
            kind: ImageKind::OcpRelease,
        });
    }

    if mirror.platform.graph {
        let reference = graph_staging_reference(opts);
        images.push(CopyImageSchema {
            source: reference.clone(),
            destination: reference.clone(),
            origin: reference,
            kind: ImageKind::CincinnatiGraph,
        });
    }

    for operator in &mirror.operators {
        let reference = qualify(&operator.catalog);
        images.push(CopyImageSchema {
            source: reference.clone(),
            destination: reference.clone(),
            origin: reference,
            kind: ImageKind::OperatorCatalog,
        });
    }

    for additional in &mirror.additional_images {
        let reference = qualify(&additional.name);
        images.push(CopyImageSchema {
            source: reference.clone(),
            destination: reference.clone(),
            origin: reference,
            kind: ImageKind::Generic,
        });
    }

    CollectorSchema::from_images(images, CopyImageSchemaMap::default())
}

fn qualify(reference: &str) -> String {
    if reference.contains("://") {
        reference.to_string()
    } else {
        format!("{DOCKER_PROTOCOL}{reference}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlift_engine::Mode;

    fn config(raw: &str) -> ImageSetConfig {
        ImageSetConfig::parse(raw).unwrap()
    }

    #[test]
    fn test_plan_covers_all_sections() {
        let config = config(
            r#"
mirror:
  platform:
    graph: true
    channels:
      - name: stable-4.16
        maxVersion: 4.16.4
  operators:
    - catalog: registry.example.com/redhat/operator-index:v4.16
  additionalImages:
    - name: registry.example.com/ubi9/ubi:latest
"#,
        );
        let plan = build_plan(&config, &CopyOptions::new(Mode::MirrorToDisk));

        assert_eq!(plan.all_images.len(), 4);
        assert_eq!(plan.total_release_images, 2);
        assert_eq!(plan.total_operator_images, 1);
        assert_eq!(plan.total_additional_images, 1);
        assert_eq!(plan.all_images[0].kind, ImageKind::OcpRelease);
        assert!(plan.all_images[0].source.contains("4.16.4-x86_64"));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_plan_qualifies_bare_references() {
        let config = config("mirror:\n  additionalImages:\n    - name: quay.io/ns/extra:1\n");
        let plan = build_plan(&config, &CopyOptions::new(Mode::MirrorToMirror));
        assert_eq!(plan.all_images[0].source, "docker://quay.io/ns/extra:1");
    }

    #[test]
    fn test_plan_channel_without_versions() {
        let config = config("mirror:\n  platform:\n    channels:\n      - name: stable-4.16\n");
        let plan = build_plan(&config, &CopyOptions::new(Mode::MirrorToDisk));
        assert!(plan.all_images[0].source.contains("latest-x86_64"));
    }
}
