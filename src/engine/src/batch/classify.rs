//! Failure classification by image role.

use airlift_core::MirrorError;

use crate::reference::strip_scheme;
use crate::schema::{CopyImageSchema, CopyImageSchemaMap, ImageKind};

/// Outcome of classifying one copy failure.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Terminal failures force the whole run to abort.
    pub terminal: bool,
    pub cause: String,
    /// Bundle references (scheme stripped) to skip for the rest of the
    /// run because their related image failed.
    pub cascaded_skips: Vec<String>,
}

/// Classify a copy failure.
///
/// Release content is terminal; every other role is recoverable. A failed
/// operator related image additionally cascades onto every bundle listed
/// under its origin. The registry error code is folded into the cause text
/// but does not change the classification.
pub fn classify(
    image: &CopyImageSchema,
    error: &MirrorError,
    map: &CopyImageSchemaMap,
) -> Classification {
    let terminal = matches!(
        image.kind,
        ImageKind::OcpRelease | ImageKind::OcpReleaseContent
    );

    let mut cascaded_skips = Vec::new();
    if image.kind == ImageKind::OperatorRelatedImage {
        if let Some(bundles) = map.bundles_by_image.get(&image.origin) {
            cascaded_skips = bundles.keys().map(|r| strip_scheme(r).to_string()).collect();
            cascaded_skips.sort();
        }
    }

    Classification {
        terminal,
        cause: error.to_string(),
        cascaded_skips,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlift_core::RegistryErrorCode;
    use std::collections::HashMap;

    fn image(kind: ImageKind, origin: &str) -> CopyImageSchema {
        CopyImageSchema {
            source: origin.to_string(),
            destination: "docker://dest.example.com/ns/img:1".to_string(),
            origin: origin.to_string(),
            kind,
        }
    }

    fn unauthorized() -> MirrorError {
        MirrorError::Registry {
            code: RegistryErrorCode::Unauthorized,
            message: "unauthorized".to_string(),
        }
    }

    #[test]
    fn test_release_roles_are_terminal() {
        let map = CopyImageSchemaMap::default();
        for kind in [ImageKind::OcpRelease, ImageKind::OcpReleaseContent] {
            let c = classify(&image(kind, "docker://q/ns/a:1"), &unauthorized(), &map);
            assert!(c.terminal, "{kind}");
            assert!(c.cascaded_skips.is_empty());
        }
    }

    #[test]
    fn test_other_roles_are_recoverable() {
        let map = CopyImageSchemaMap::default();
        for kind in [
            ImageKind::OperatorCatalog,
            ImageKind::OperatorBundle,
            ImageKind::OperatorRelatedImage,
            ImageKind::CincinnatiGraph,
            ImageKind::Generic,
        ] {
            let c = classify(&image(kind, "docker://q/ns/a:1"), &unauthorized(), &map);
            assert!(!c.terminal, "{kind}");
        }
    }

    #[test]
    fn test_related_image_cascades_onto_bundles() {
        let origin = "docker://q/ns/related@sha256:f30638f60452062aba36a26ee6c036fe";
        let mut map = CopyImageSchemaMap::default();
        let mut bundles = HashMap::new();
        bundles.insert("q/ns/bundle-b:1".to_string(), "bundle-b".to_string());
        bundles.insert("q/ns/bundle-a:1".to_string(), "bundle-a".to_string());
        map.bundles_by_image.insert(origin.to_string(), bundles);

        let c = classify(
            &image(ImageKind::OperatorRelatedImage, origin),
            &unauthorized(),
            &map,
        );
        assert!(!c.terminal);
        assert_eq!(c.cascaded_skips, vec!["q/ns/bundle-a:1", "q/ns/bundle-b:1"]);
    }

    #[test]
    fn test_related_image_without_bundles_has_no_cascade() {
        let map = CopyImageSchemaMap::default();
        let c = classify(
            &image(ImageKind::OperatorRelatedImage, "docker://q/ns/related:1"),
            &unauthorized(),
            &map,
        );
        assert!(c.cascaded_skips.is_empty());
    }

    #[test]
    fn test_cause_carries_error_code() {
        let map = CopyImageSchemaMap::default();
        let c = classify(
            &image(ImageKind::Generic, "docker://q/ns/a:1"),
            &MirrorError::Registry {
                code: RegistryErrorCode::ManifestUnknown,
                message: "Manifest Unknown".to_string(),
            },
            &map,
        );
        assert!(c.cause.contains("manifest unknown"));
    }
}
