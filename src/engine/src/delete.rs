//! Delete planning.
//!
//! A delete run reuses the dispatch machinery with a delete-flavored
//! copier: each dispatched image is resolved against the destination and
//! recorded, and the resulting plan is persisted as metadata the operator
//! can review before anything is removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use airlift_core::{MirrorError, Result};

use crate::copier::{CancelSignal, ImageCopier, ManifestProbe};
use crate::options::{CopyOptions, Mode};

/// Filename of the persisted delete plan.
pub const DELETE_IMAGES_FILE: &str = "delete-images.yaml";

/// One image scheduled for deletion, pinned to the digest observed when
/// the plan was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntry {
    pub reference: String,
    pub digest: String,
}

/// The persisted delete plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageList {
    #[serde(default)]
    pub items: Vec<DeleteEntry>,
}

/// Write the delete plan under `dir` and return its path.
pub fn write_delete_metadata(dir: &Path, items: Vec<DeleteEntry>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(DELETE_IMAGES_FILE);
    let list = DeleteImageList { items };
    std::fs::write(&path, serde_yaml::to_string(&list)?)?;
    Ok(path)
}

/// Read a previously written delete plan from `dir`.
pub fn read_delete_metadata(dir: &Path) -> Result<DeleteImageList> {
    let path = dir.join(DELETE_IMAGES_FILE);
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        MirrorError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_yaml::from_str(&raw)?)
}

/// Delete-flavored copier: resolves each image at the destination and
/// records it instead of moving bytes.
pub struct DeleteCopier {
    probe: Arc<dyn ManifestProbe>,
    recorded: Mutex<Vec<DeleteEntry>>,
}

impl DeleteCopier {
    pub fn new(probe: Arc<dyn ManifestProbe>) -> Self {
        Self {
            probe,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Drain the entries recorded so far.
    pub async fn take_entries(&self) -> Vec<DeleteEntry> {
        std::mem::take(&mut *self.recorded.lock().await)
    }
}

#[async_trait]
impl ImageCopier for DeleteCopier {
    async fn run(
        &self,
        cancel: CancelSignal,
        _src: &str,
        dest: &str,
        _mode: Mode,
        _opts: &CopyOptions,
    ) -> Result<()> {
        if *cancel.borrow() {
            return Err(MirrorError::Cancelled);
        }
        let digest = self.probe.get_digest(dest).await?;
        tracing::info!(reference = dest, %digest, "scheduled for deletion");
        self.recorded.lock().await.push(DeleteEntry {
            reference: dest.to_string(),
            digest,
        });
        Ok(())
    }

    async fn check(&self, image: &str, _opts: &CopyOptions, _as_copy_src: bool) -> Result<bool> {
        Ok(self.probe.get_digest(image).await.is_ok())
    }
}
