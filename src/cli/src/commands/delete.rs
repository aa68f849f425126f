//! `airlift delete` command: plan removal of previously mirrored images.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use airlift_core::ImageSetConfig;
use airlift_engine::delete::{write_delete_metadata, DeleteCopier};
use airlift_engine::manifest::OciManifestProbe;
use airlift_engine::{
    cancellation, ConcurrentWorker, CopyOptions, Function, Mode, RegistryAuth, WorkerError,
    DEFAULT_BATCH_SIZE,
};

use crate::plan;

#[derive(Args)]
pub struct DeleteArgs {
    /// Path to the image set configuration describing what to remove
    #[arg(short, long)]
    pub config: PathBuf,

    /// Destination registry holding the mirrored content
    pub destination: String,

    /// Working directory; the delete plan is written here
    #[arg(long, default_value = "working-dir")]
    pub workspace: PathBuf,

    /// Host:port of the local cache registry
    #[arg(long, default_value = "localhost:55000")]
    pub cache_registry: String,

    /// Images resolved concurrently within a batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

pub async fn execute(args: DeleteArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ImageSetConfig::from_file(&args.config)?;

    let mut opts = CopyOptions::new(Mode::DiskToMirror);
    opts.function = Function::Delete;
    opts.destination = args.destination.clone();
    opts.workspace_dir = args.workspace.clone();
    opts.local_store_fqdn = args.cache_registry.clone();
    opts.batch_size = args.batch_size;
    opts.update_url_override = std::env::var("UPDATE_URL_OVERRIDE").ok();

    let collected = plan::build_plan(&config, &opts);
    tracing::info!(images = collected.all_images.len(), "delete plan built");

    let journal_root = tempfile::Builder::new()
        .prefix("airlift-")
        .tempdir()?
        .into_path();

    let probe = Arc::new(OciManifestProbe::with_auth(RegistryAuth::from_env()));
    let copier = Arc::new(DeleteCopier::new(probe.clone()));
    let worker = ConcurrentWorker::new(copier.clone(), journal_root)
        .with_batch_size(args.batch_size)
        .with_probe(probe);

    let (cancel_tx, cancel_rx) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let (_, error) = worker.mirror(cancel_rx, collected, &opts).await;
    match error {
        None => {}
        Some(err @ WorkerError::Safe { .. }) => eprintln!("Warning: {err}"),
        Some(err) => return Err(Box::new(err)),
    }

    let entries = copier.take_entries().await;
    let path = write_delete_metadata(&args.workspace, entries)?;
    println!("delete plan written to {}", path.display());
    Ok(())
}
