//! Aggregate worker errors.

use std::path::{Path, PathBuf};

use thiserror::Error;

use airlift_core::MirrorError;

/// Terminal outcome of a worker invocation that did not fully succeed.
///
/// Safe means the caller may continue its run with partial content;
/// unsafe means release content is missing and the run must abort. Both
/// carry the journal path so the operator can inspect what failed.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("release image mirroring failed, the destination is unusable; error details in {}", .journal.display())]
    Unsafe { journal: PathBuf },

    #[error("some images could not be mirrored, the run can continue; error details in {}", .journal.display())]
    Safe { journal: PathBuf },

    #[error("mirroring cancelled{}", .inner.as_deref().map(|e| format!(": {e}")).unwrap_or_default())]
    Cancelled { inner: Option<Box<WorkerError>> },

    /// A pre-dispatch configuration problem, surfaced without a journal.
    #[error(transparent)]
    Fatal(#[from] MirrorError),
}

impl WorkerError {
    /// The journal path, when one was written.
    pub fn journal(&self) -> Option<&Path> {
        match self {
            WorkerError::Unsafe { journal } | WorkerError::Safe { journal } => Some(journal),
            WorkerError::Cancelled { inner: Some(inner) } => inner.journal(),
            _ => None,
        }
    }

    /// Whether the caller must abort rather than continue.
    pub fn is_unsafe(&self) -> bool {
        match self {
            WorkerError::Unsafe { .. } => true,
            WorkerError::Cancelled { inner: Some(inner) } => inner.is_unsafe(),
            _ => false,
        }
    }
}
