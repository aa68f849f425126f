//! CLI command definitions and dispatch.

mod delete;
mod mirror;
mod version;

use clap::{Parser, Subcommand};

/// airlift, a mirror for OpenShift content in disconnected environments.
#[derive(Parser)]
#[command(name = "airlift", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Mirror release, operator, and additional images
    Mirror(mirror::MirrorArgs),
    /// Plan deletion of previously mirrored images
    Delete(delete::DeleteArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Mirror(args) => mirror::execute(args).await,
        Command::Delete(args) => delete::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
