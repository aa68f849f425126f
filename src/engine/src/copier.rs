//! Collaborator contracts: the single-image copy primitive and manifest
//! access.

use async_trait::async_trait;
use tokio::sync::watch;

use airlift_core::Result;

use crate::options::{CopyOptions, Mode};

/// Cancellation signal shared between the worker and in-flight copies.
/// `true` means "stop"; receivers observe it at their next await point.
pub type CancelSignal = watch::Receiver<bool>;

/// A fresh cancellation pair. Send `true` on the sender to request a stop.
pub fn cancellation() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// Resolves once cancellation is requested. Pends forever when the sender
/// is gone, since a stop can then no longer be requested.
pub async fn cancelled(signal: &mut CancelSignal) {
    loop {
        if *signal.borrow() {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Copies one image from `src` to `dest`.
///
/// The copy is idempotent on the destination: retrying a successful copy
/// is a no-op. Implementations own their retry/backoff over transient
/// network failures; callers do not add retries on top.
#[async_trait]
pub trait ImageCopier: Send + Sync {
    async fn run(
        &self,
        cancel: CancelSignal,
        src: &str,
        dest: &str,
        mode: Mode,
        opts: &CopyOptions,
    ) -> Result<()>;

    /// Probe whether `image` exists, as a copy source or destination.
    async fn check(&self, image: &str, opts: &CopyOptions, as_copy_src: bool) -> Result<bool>;
}

/// Resolves the manifest digest behind a scheme-qualified reference.
#[async_trait]
pub trait ManifestProbe: Send + Sync {
    async fn get_digest(&self, reference: &str) -> Result<String>;
}
