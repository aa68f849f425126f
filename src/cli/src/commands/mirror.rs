//! `airlift mirror` command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use airlift_core::ImageSetConfig;
use airlift_engine::manifest::OciManifestProbe;
use airlift_engine::reference::{FILE_PROTOCOL, OCI_PROTOCOL};
use airlift_engine::{
    cancellation, ConcurrentWorker, CopyOptions, Mode, RegistryAuth, RegistryCopier,
    WorkerError, DEFAULT_BATCH_SIZE,
};

use crate::plan;

#[derive(Args)]
pub struct MirrorArgs {
    /// Path to the image set configuration
    #[arg(short, long)]
    pub config: PathBuf,

    /// Where content goes: "docker://registry/base", or "file://<path>"
    /// to fill the local content store
    pub destination: String,

    /// Read images from the local content store instead of upstream
    #[arg(long)]
    pub from: Option<String>,

    /// Working directory for staged content and state
    #[arg(long, default_value = "working-dir")]
    pub workspace: PathBuf,

    /// Host:port of the local cache registry
    #[arg(long, default_value = "localhost:55000")]
    pub cache_registry: String,

    /// Images copied concurrently within a batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Tag applied to release content at the destination
    #[arg(long, default_value = "")]
    pub release_tag: String,
}

pub async fn execute(args: MirrorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ImageSetConfig::from_file(&args.config)?;
    let mode = infer_mode(&args.destination, args.from.as_deref());

    let mut opts = CopyOptions::new(mode);
    opts.destination = args.destination.clone();
    opts.workspace_dir = args.workspace.clone();
    opts.local_store_fqdn = args.cache_registry.clone();
    opts.batch_size = args.batch_size;
    opts.release_tag = args.release_tag.clone();
    // Read once here; the engine never touches the process environment.
    opts.update_url_override = std::env::var("UPDATE_URL_OVERRIDE").ok();

    let collected = plan::build_plan(&config, &opts);
    tracing::info!(images = collected.all_images.len(), mode = %mode, "mirror plan built");

    let journal_root = tempfile::Builder::new()
        .prefix("airlift-")
        .tempdir()?
        .into_path();

    let auth = RegistryAuth::from_env();
    let copier = Arc::new(RegistryCopier::with_auth(auth.clone()));
    let probe = Arc::new(OciManifestProbe::with_auth(auth));
    let worker = ConcurrentWorker::new(copier, journal_root)
        .with_batch_size(args.batch_size)
        .with_probe(probe);

    let (cancel_tx, cancel_rx) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let (copied, error) = worker.mirror(cancel_rx, collected, &opts).await;
    match error {
        None => {
            println!("mirrored {} images", copied.all_images.len());
            Ok(())
        }
        // The run can continue with partial content; report and move on.
        Some(err @ WorkerError::Safe { .. }) => {
            eprintln!("Warning: {err}");
            println!(
                "mirrored {} images with some failures",
                copied.all_images.len()
            );
            Ok(())
        }
        Some(err) => Err(Box::new(err)),
    }
}

/// Modes fall out of where content is read from and written to.
fn infer_mode(destination: &str, from: Option<&str>) -> Mode {
    if destination.starts_with(FILE_PROTOCOL) || destination.starts_with(OCI_PROTOCOL) {
        Mode::MirrorToDisk
    } else if from.is_some() {
        Mode::DiskToMirror
    } else {
        Mode::MirrorToMirror
    }
}
