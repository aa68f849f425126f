//! Image set configuration.
//!
//! Declares what a mirroring run should carry: release channels, operator
//! catalogs, and additional images. Loaded from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};

/// Top-level image set configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSetConfig {
    #[serde(default)]
    pub mirror: Mirror,
}

/// Content selection for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mirror {
    #[serde(default)]
    pub platform: Platform,

    #[serde(default)]
    pub operators: Vec<Operator>,

    #[serde(default)]
    pub additional_images: Vec<AdditionalImage>,
}

/// OpenShift release selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    #[serde(default)]
    pub channels: Vec<PlatformChannel>,

    /// Also mirror the update graph image alongside the release.
    #[serde(default)]
    pub graph: bool,
}

/// One release channel, optionally bounded by version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformChannel {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
}

/// One operator catalog, optionally filtered to named packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub catalog: String,

    #[serde(default)]
    pub packages: Vec<OperatorPackage>,
}

/// A package filter within an operator catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorPackage {
    pub name: String,
}

/// An image mirrored verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalImage {
    pub name: String,
}

impl ImageSetConfig {
    /// Load and validate a configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MirrorError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate a configuration from a YAML string.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: ImageSetConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations with nothing to mirror or unusable entries.
    pub fn validate(&self) -> Result<()> {
        let mirror = &self.mirror;
        if mirror.platform.channels.is_empty()
            && !mirror.platform.graph
            && mirror.operators.is_empty()
            && mirror.additional_images.is_empty()
        {
            return Err(MirrorError::Config(
                "image set selects nothing to mirror".to_string(),
            ));
        }
        for channel in &mirror.platform.channels {
            if channel.name.is_empty() {
                return Err(MirrorError::Config(
                    "platform channel with empty name".to_string(),
                ));
            }
        }
        for operator in &mirror.operators {
            if operator.catalog.is_empty() {
                return Err(MirrorError::Config(
                    "operator entry with empty catalog".to_string(),
                ));
            }
        }
        for image in &mirror.additional_images {
            if image.name.is_empty() {
                return Err(MirrorError::Config(
                    "additional image with empty name".to_string(),
                ));
            }
        }
        Ok(())
    }
}
