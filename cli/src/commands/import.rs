//! `freighter store import` command - unpack archives into the store.

use std::path::PathBuf;

use clap::Args;
use freighter_core::consts::DEFAULT_FREIGHTER_ARCHIVE_NAME;
use freighter_store::workflow;
use freighter_store::CopyOptions;

#[derive(Args)]
pub struct ImportArgs {
    /// Archives to import
    #[arg(default_value = DEFAULT_FREIGHTER_ARCHIVE_NAME)]
    pub archives: Vec<PathBuf>,

    /// Number of blobs transferred at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

pub async fn execute(ctx: &super::Context, args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;
    let options = CopyOptions::with_concurrency(args.concurrency);

    for archive in &args.archives {
        let imported =
            workflow::import_archive(&ctx.cancel, &layout, archive, &ctx.config.temp_dir, &options)
                .await?;
        for (reference, desc) in &imported {
            println!("Imported: {reference} ({})", desc.digest);
        }
    }
    Ok(())
}
