//! Mirroring engine for airlift.
//!
//! Drives parallel image copies between an upstream registry, the local
//! content store on disk, and a destination registry. The batch worker
//! dispatches bounded-concurrency copies, classifies failures by image
//! role, journals them, and decides whether the run may continue or must
//! abort.

pub mod batch;
pub mod copier;
pub mod delete;
pub mod graph;
pub mod manifest;
pub mod options;
pub mod reference;
pub mod registry;
pub mod schema;
pub mod transform;

pub use batch::{
    split_images_to_batches, BatchSchema, ConcurrentWorker, FailureJournal, WorkerError,
};
pub use copier::{cancellation, CancelSignal, ImageCopier, ManifestProbe};
pub use options::{CopyOptions, Function, Mode, DEFAULT_BATCH_SIZE};
pub use registry::{RegistryAuth, RegistryCopier};
pub use schema::{
    CollectorSchema, CopyImageSchema, CopyImageSchemaMap, ImageKind, MirrorErrorRecord,
};
