//! `freighter store add` command.

use std::path::PathBuf;

use clap::Args;
use freighter_store::workflow;

#[derive(Args)]
pub struct AddArgs {
    /// Path of the local file to store
    pub path: PathBuf,

    /// Artifact name (default: the file name)
    #[arg(short, long)]
    pub name: Option<String>,
}

pub async fn execute(ctx: &super::Context, args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;
    let desc = workflow::add_file(&layout, &args.path, args.name.as_deref()).await?;
    println!(
        "Added: {} ({})",
        desc.ref_name().unwrap_or("<none>"),
        desc.digest
    );
    Ok(())
}
