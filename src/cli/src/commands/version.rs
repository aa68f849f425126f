//! `airlift version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.json {
        let payload = serde_json::json!({
            "name": "airlift",
            "version": airlift_core::VERSION,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("airlift {}", airlift_core::VERSION);
    }
    Ok(())
}
