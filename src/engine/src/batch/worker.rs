//! The concurrent batch worker.
//!
//! For each batch, up to the batch size of copies run in flight; the
//! coordinator consumes their outcomes over a channel and is the only
//! task that touches the bookkeeping state. Batches are joined before the
//! next one starts so that skip decisions derived from batch *k* hold for
//! batch *k+1*.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use airlift_core::MirrorError;

use crate::copier::{CancelSignal, ImageCopier, ManifestProbe};
use crate::graph;
use crate::options::{CopyOptions, Mode, DEFAULT_BATCH_SIZE};
use crate::reference::strip_scheme;
use crate::schema::{CollectorSchema, CopyImageSchema, ImageKind, MirrorErrorRecord};
use crate::transform;

use super::classify::classify;
use super::error::WorkerError;
use super::journal::FailureJournal;
use super::skip::{should_skip, SkipReason};
use super::split_images_to_batches;

/// Outcome of one dispatched copy, reported back to the coordinator.
struct CopyOutcome {
    image: CopyImageSchema,
    result: Result<(), MirrorError>,
}

/// Batch worker driving parallel image copies.
pub struct ConcurrentWorker {
    copier: Arc<dyn ImageCopier>,
    probe: Option<Arc<dyn ManifestProbe>>,
    journal_root: PathBuf,
    batch_size: usize,
}

impl ConcurrentWorker {
    pub fn new(copier: Arc<dyn ImageCopier>, journal_root: impl Into<PathBuf>) -> Self {
        Self {
            copier,
            probe: None,
            journal_root: journal_root.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Wire the manifest probe used to locate a locally built graph image.
    pub fn with_probe(mut self, probe: Arc<dyn ManifestProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Mirror every image in `collected` under `opts`.
    ///
    /// Returns the subset that was actually copied together with the
    /// aggregate outcome: `None` on full success, a safe error when only
    /// recoverable roles failed, an unsafe error when release content
    /// failed. Per-image failures never surface directly; they are
    /// journaled, and the journal path is embedded in the error.
    pub async fn mirror(
        &self,
        cancel: CancelSignal,
        collected: CollectorSchema,
        opts: &CopyOptions,
    ) -> (CollectorSchema, Option<WorkerError>) {
        if let Err(err) = collected.validate() {
            return (CollectorSchema::default(), Some(WorkerError::Fatal(err)));
        }
        let graph_source = match self.locate_graph_source(&collected, opts).await {
            Ok(graph_source) => graph_source,
            Err(err) => return (CollectorSchema::default(), Some(err)),
        };

        tracing::info!(
            total = collected.all_images.len(),
            mode = %opts.mode,
            batch_size = self.batch_size,
            "starting {} run",
            opts.function
        );

        let mut journal = FailureJournal::new(&self.journal_root);
        let mut skip_set: HashSet<String> = HashSet::new();
        let mut errors: Vec<MirrorErrorRecord> = Vec::new();
        let mut copied: Vec<CopyImageSchema> = Vec::new();
        let mut cancelled = false;

        let batches = split_images_to_batches(&collected, self.batch_size);
        'batches: for (batch_index, batch) in batches.iter().enumerate() {
            if *cancel.borrow() {
                cancelled = true;
                break 'batches;
            }

            let capacity = batch.images.all_images.len().max(1);
            let (tx, mut rx) = mpsc::channel::<CopyOutcome>(capacity);
            let mut dispatched = 0usize;

            for image in &batch.images.all_images {
                if *cancel.borrow() {
                    cancelled = true;
                    break;
                }

                match should_skip(image, opts.mode, opts.update_url_override.as_deref(), &errors) {
                    Some(SkipReason::UpdateGraphUnavailable) => {
                        tracing::info!(
                            image = %image.source,
                            "graph image is served by the update service, nothing to mirror"
                        );
                        // Surfaced as handled so downstream resource
                        // generation still sees it.
                        copied.push(image.clone());
                        continue;
                    }
                    Some(SkipReason::CascadedBundle(reference)) => {
                        note_skip(&mut journal, &reference);
                        tracing::warn!(image = %image.source, "skipping cascaded bundle");
                        continue;
                    }
                    None => {}
                }

                if skip_set.contains(strip_scheme(&image.origin))
                    || skip_set.contains(strip_scheme(&image.source))
                {
                    note_skip(&mut journal, strip_scheme(&image.origin));
                    tracing::warn!(image = %image.source, "skipping cascaded bundle");
                    continue;
                }

                let (mut src, dest) = match transform::prepare(image, opts) {
                    Ok(pair) => pair,
                    Err(err) => {
                        record_failure(
                            &mut journal,
                            &mut skip_set,
                            &mut errors,
                            &collected,
                            image.clone(),
                            err,
                        );
                        continue;
                    }
                };
                if image.kind == ImageKind::CincinnatiGraph && opts.mode != Mode::DiskToMirror {
                    if let Some(resolved) = &graph_source {
                        src = resolved.clone();
                    }
                }

                let copier = Arc::clone(&self.copier);
                let task_cancel = cancel.clone();
                let task_tx = tx.clone();
                let task_image = image.clone();
                let task_opts = opts.clone();
                tokio::spawn(async move {
                    let result = copier
                        .run(task_cancel, &src, &dest, task_opts.mode, &task_opts)
                        .await;
                    let _ = task_tx
                        .send(CopyOutcome {
                            image: task_image,
                            result,
                        })
                        .await;
                });
                dispatched += 1;
            }
            drop(tx);

            // Batch join: every dispatched copy reports in before the next
            // batch starts, making this batch's failures visible to the
            // next batch's skip decisions.
            for _ in 0..dispatched {
                let Some(outcome) = rx.recv().await else { break };
                match outcome.result {
                    Ok(()) => {
                        tracing::debug!(image = %outcome.image.source, batch = batch_index, "copied");
                        copied.push(outcome.image);
                    }
                    Err(MirrorError::Cancelled) => {
                        cancelled = true;
                    }
                    Err(err) => {
                        record_failure(
                            &mut journal,
                            &mut skip_set,
                            &mut errors,
                            &collected,
                            outcome.image,
                            err,
                        );
                    }
                }
            }
        }

        let terminal = errors.iter().any(|record| {
            matches!(
                record.image.kind,
                ImageKind::OcpRelease | ImageKind::OcpReleaseContent
            )
        });
        let flavor = if terminal {
            Some(WorkerError::Unsafe {
                journal: journal.path().to_path_buf(),
            })
        } else if !errors.is_empty() {
            Some(WorkerError::Safe {
                journal: journal.path().to_path_buf(),
            })
        } else {
            None
        };

        tracing::info!(
            copied = copied.len(),
            failed = errors.len(),
            cancelled,
            "{} run finished",
            opts.function
        );

        let out = CollectorSchema::from_images(copied, collected.schema_map);
        let error = if cancelled {
            Some(WorkerError::Cancelled {
                inner: flavor.map(Box::new),
            })
        } else {
            flavor
        };
        (out, error)
    }

    /// When an update URL override promises a locally built graph image,
    /// resolve where it actually lives before dispatching anything.
    async fn locate_graph_source(
        &self,
        collected: &CollectorSchema,
        opts: &CopyOptions,
    ) -> Result<Option<String>, WorkerError> {
        if opts.update_url_override.is_none() || opts.mode == Mode::DiskToMirror {
            return Ok(None);
        }
        if !collected
            .all_images
            .iter()
            .any(|image| image.kind == ImageKind::CincinnatiGraph)
        {
            return Ok(None);
        }
        let Some(probe) = &self.probe else {
            return Ok(None);
        };
        let resolved = graph::resolve_graph_image(probe.as_ref(), opts)
            .await
            .map_err(WorkerError::Fatal)?;
        Ok(Some(resolved))
    }
}

fn note_skip(journal: &mut FailureJournal, reference: &str) {
    if let Err(err) = journal.note_skip(reference) {
        tracing::warn!(error = %err, "could not write the failure journal");
    }
}

/// Journal and account for one failed copy. Journal write failures are
/// logged rather than propagated so an unwritable disk cannot hide the
/// copy failures themselves.
fn record_failure(
    journal: &mut FailureJournal,
    skip_set: &mut HashSet<String>,
    errors: &mut Vec<MirrorErrorRecord>,
    collected: &CollectorSchema,
    image: CopyImageSchema,
    err: MirrorError,
) {
    let classification = classify(&image, &err, &collected.schema_map);
    tracing::error!(
        image = %image.source,
        kind = %image.kind,
        cause = %classification.cause,
        terminal = classification.terminal,
        "copy failed"
    );
    let record = MirrorErrorRecord {
        image,
        cause: classification.cause,
        cascaded_skips: classification.cascaded_skips,
    };
    if let Err(journal_err) = journal.record_failure(&record) {
        tracing::warn!(error = %journal_err, "could not write the failure journal");
    }
    for reference in &record.cascaded_skips {
        skip_set.insert(reference.clone());
    }
    errors.push(record);
}
