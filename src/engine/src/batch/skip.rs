//! Pre-dispatch skip decisions.

use crate::options::Mode;
use crate::reference::strip_scheme;
use crate::schema::{CopyImageSchema, ImageKind, MirrorErrorRecord};

/// Why an image is skipped before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The update graph is served by the update service; without an
    /// override there is nothing to mirror upstream.
    UpdateGraphUnavailable,
    /// The image belongs to an operator bundle whose related image
    /// already failed. Carries the reference to journal.
    CascadedBundle(String),
}

/// Decide whether `image` should be dispatched at all.
///
/// Pure; consults only the arguments. The update URL override is injected
/// by the caller rather than read from the process environment.
pub fn should_skip(
    image: &CopyImageSchema,
    mode: Mode,
    update_url_override: Option<&str>,
    prior_failures: &[MirrorErrorRecord],
) -> Option<SkipReason> {
    // Disk-to-mirror always dispatches the graph image so the destination
    // sees it.
    if image.kind == ImageKind::CincinnatiGraph
        && matches!(mode, Mode::MirrorToDisk | Mode::MirrorToMirror)
        && update_url_override.is_none()
    {
        return Some(SkipReason::UpdateGraphUnavailable);
    }

    let origin = strip_scheme(&image.origin);
    let source = strip_scheme(&image.source);
    for failure in prior_failures {
        for skipped in &failure.cascaded_skips {
            if skipped == origin || skipped == source {
                return Some(SkipReason::CascadedBundle(skipped.clone()));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_image() -> CopyImageSchema {
        CopyImageSchema {
            source: "docker://registry.example.com/ns/graph:1".to_string(),
            destination: "docker://dest.example.com/openshift/graph-image:latest".to_string(),
            origin: "docker://registry.example.com/ns/graph:1".to_string(),
            kind: ImageKind::CincinnatiGraph,
        }
    }

    fn bundle_image(origin: &str) -> CopyImageSchema {
        CopyImageSchema {
            source: origin.to_string(),
            destination: "docker://dest.example.com/ns/bundle:1".to_string(),
            origin: origin.to_string(),
            kind: ImageKind::OperatorBundle,
        }
    }

    const OVERRIDE: &str = "https://updates.example.com/graph";

    #[test]
    fn test_graph_skipped_in_m2m_without_override() {
        let skip = should_skip(&graph_image(), Mode::MirrorToMirror, None, &[]);
        assert_eq!(skip, Some(SkipReason::UpdateGraphUnavailable));
    }

    #[test]
    fn test_graph_skipped_in_m2d_without_override() {
        let skip = should_skip(&graph_image(), Mode::MirrorToDisk, None, &[]);
        assert_eq!(skip, Some(SkipReason::UpdateGraphUnavailable));
    }

    #[test]
    fn test_graph_dispatched_in_d2m_without_override() {
        assert_eq!(should_skip(&graph_image(), Mode::DiskToMirror, None, &[]), None);
    }

    #[test]
    fn test_graph_dispatched_in_m2m_with_override() {
        let skip = should_skip(&graph_image(), Mode::MirrorToMirror, Some(OVERRIDE), &[]);
        assert_eq!(skip, None);
    }

    #[test]
    fn test_graph_dispatched_in_m2d_with_override() {
        let skip = should_skip(&graph_image(), Mode::MirrorToDisk, Some(OVERRIDE), &[]);
        assert_eq!(skip, None);
    }

    #[test]
    fn test_graph_dispatched_in_d2m_with_override() {
        let skip = should_skip(&graph_image(), Mode::DiskToMirror, Some(OVERRIDE), &[]);
        assert_eq!(skip, None);
    }

    #[test]
    fn test_cascaded_bundle_is_skipped() {
        let bundle = bundle_image("docker://registry.example.com/ns/bundle-c:1");
        let failure = MirrorErrorRecord {
            image: CopyImageSchema {
                source: "docker://registry.example.com/ns/related:1".to_string(),
                destination: "docker://dest.example.com/ns/related:1".to_string(),
                origin: "docker://registry.example.com/ns/related:1".to_string(),
                kind: ImageKind::OperatorRelatedImage,
            },
            cause: "unauthorized".to_string(),
            cascaded_skips: vec!["registry.example.com/ns/bundle-c:1".to_string()],
        };

        let skip = should_skip(&bundle, Mode::MirrorToDisk, None, &[failure]);
        assert_eq!(
            skip,
            Some(SkipReason::CascadedBundle(
                "registry.example.com/ns/bundle-c:1".to_string()
            ))
        );
    }

    #[test]
    fn test_unrelated_failure_does_not_skip() {
        let bundle = bundle_image("docker://registry.example.com/ns/bundle-c:1");
        let failure = MirrorErrorRecord {
            image: bundle_image("docker://registry.example.com/ns/other:1"),
            cause: "unauthorized".to_string(),
            cascaded_skips: vec![],
        };
        assert_eq!(should_skip(&bundle, Mode::MirrorToDisk, None, &[failure]), None);
    }
}
