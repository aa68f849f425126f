//! Mirror plan data model.
//!
//! A run is described by a [`CollectorSchema`]: the ordered list of images
//! to move, per-role totals, and the operator bundle lookup tables that
//! drive cascading skips.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use airlift_core::{MirrorError, Result};

/// Role of an image within the mirror plan.
///
/// Roles are assigned by the collectors and never change afterwards. They
/// decide how a copy failure is classified and whether the image may be
/// skipped before dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageKind {
    /// The top-level release payload image.
    OcpRelease,
    /// A component referenced by a release payload.
    OcpReleaseContent,
    OperatorCatalog,
    OperatorBundle,
    OperatorRelatedImage,
    /// The locally built update graph image.
    CincinnatiGraph,
    /// An additional image mirrored verbatim.
    #[default]
    Generic,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::OcpRelease => "ocpRelease",
            ImageKind::OcpReleaseContent => "ocpReleaseContent",
            ImageKind::OperatorCatalog => "operatorCatalog",
            ImageKind::OperatorBundle => "operatorBundle",
            ImageKind::OperatorRelatedImage => "operatorRelatedImage",
            ImageKind::CincinnatiGraph => "cincinnatiGraph",
            ImageKind::Generic => "generic",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One mirror unit.
///
/// `origin` is the canonical upstream reference and is preserved across
/// mode transformations; it keys the bundle lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyImageSchema {
    pub source: String,
    pub destination: String,
    pub origin: String,
    pub kind: ImageKind,
}

/// Lookup tables keyed by image origin.
///
/// `bundles_by_image[origin]` maps a bundle reference (scheme stripped) to
/// the bundle name. When an operator related image fails, every bundle
/// reference found under its origin must be skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyImageSchemaMap {
    pub operators_by_image: HashMap<String, HashSet<String>>,
    pub bundles_by_image: HashMap<String, HashMap<String, String>>,
}

/// The full mirror plan handed to the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorSchema {
    pub all_images: Vec<CopyImageSchema>,
    pub total_release_images: usize,
    pub total_operator_images: usize,
    pub total_additional_images: usize,
    #[serde(default)]
    pub schema_map: CopyImageSchemaMap,
}

impl CollectorSchema {
    /// Build a schema from images, recomputing the per-role totals.
    pub fn from_images(all_images: Vec<CopyImageSchema>, schema_map: CopyImageSchemaMap) -> Self {
        let (release, operator, additional) = count_roles(&all_images);
        Self {
            all_images,
            total_release_images: release,
            total_operator_images: operator,
            total_additional_images: additional,
            schema_map,
        }
    }

    /// Every image must carry a non-empty source, destination, and origin.
    pub fn validate(&self) -> Result<()> {
        for (index, image) in self.all_images.iter().enumerate() {
            if image.source.is_empty() || image.destination.is_empty() || image.origin.is_empty() {
                return Err(MirrorError::Config(format!(
                    "image {} ({}) is missing a source, destination, or origin",
                    index, image.kind
                )));
            }
        }
        Ok(())
    }
}

/// One failed image together with its cause and any cascaded skips.
#[derive(Debug, Clone)]
pub struct MirrorErrorRecord {
    pub image: CopyImageSchema,
    pub cause: String,
    /// References (scheme stripped) that must be skipped as a consequence.
    pub cascaded_skips: Vec<String>,
}

fn count_roles(images: &[CopyImageSchema]) -> (usize, usize, usize) {
    let mut release = 0;
    let mut operator = 0;
    let mut additional = 0;
    for image in images {
        match image.kind {
            ImageKind::OcpRelease | ImageKind::OcpReleaseContent | ImageKind::CincinnatiGraph => {
                release += 1
            }
            ImageKind::OperatorCatalog
            | ImageKind::OperatorBundle
            | ImageKind::OperatorRelatedImage => operator += 1,
            ImageKind::Generic => additional += 1,
        }
    }
    (release, operator, additional)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(kind: ImageKind, name: &str) -> CopyImageSchema {
        CopyImageSchema {
            source: format!("docker://registry.example.com/ns/{name}:1"),
            destination: format!("docker://dest.example.com/ns/{name}:1"),
            origin: format!("docker://registry.example.com/ns/{name}:1"),
            kind,
        }
    }

    #[test]
    fn test_totals_by_role() {
        let schema = CollectorSchema::from_images(
            vec![
                image(ImageKind::OcpRelease, "release"),
                image(ImageKind::OcpReleaseContent, "etcd"),
                image(ImageKind::CincinnatiGraph, "graph"),
                image(ImageKind::OperatorCatalog, "catalog"),
                image(ImageKind::OperatorBundle, "bundle"),
                image(ImageKind::OperatorRelatedImage, "related"),
                image(ImageKind::Generic, "extra"),
            ],
            CopyImageSchemaMap::default(),
        );
        assert_eq!(schema.total_release_images, 3);
        assert_eq!(schema.total_operator_images, 3);
        assert_eq!(schema.total_additional_images, 1);
    }

    #[test]
    fn test_validate_rejects_empty_origin() {
        let mut bad = image(ImageKind::Generic, "extra");
        bad.origin = String::new();
        let schema = CollectorSchema::from_images(vec![bad], CopyImageSchemaMap::default());
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_complete_images() {
        let schema = CollectorSchema::from_images(
            vec![image(ImageKind::Generic, "extra")],
            CopyImageSchemaMap::default(),
        );
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&ImageKind::OcpReleaseContent).unwrap();
        assert_eq!(json, "\"ocpReleaseContent\"");
        let parsed: ImageKind = serde_json::from_str("\"cincinnatiGraph\"").unwrap();
        assert_eq!(parsed, ImageKind::CincinnatiGraph);
    }
}
