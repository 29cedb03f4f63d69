//! `freighter store export` command - pack the store into one archive.

use std::path::PathBuf;

use clap::Args;
use freighter_core::consts::DEFAULT_FREIGHTER_ARCHIVE_NAME;
use freighter_store::workflow::{self, ExportOptions};
use freighter_store::{CopyOptions, Platform};

#[derive(Args)]
pub struct ExportArgs {
    /// Archive to write
    #[arg(short, long, default_value = DEFAULT_FREIGHTER_ARCHIVE_NAME)]
    pub filename: PathBuf,

    /// Keep only this platform of multi-platform images, e.g. linux/amd64
    /// (default: all platforms)
    #[arg(short, long)]
    pub platform: Option<String>,

    /// Only export references containing this text
    #[arg(short, long)]
    pub only: Option<String>,

    /// Number of blobs staged at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

pub async fn execute(ctx: &super::Context, args: ExportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;
    let options = ExportOptions {
        platform: args.platform.as_deref().map(Platform::parse).transpose()?,
        only: args.only,
        copy: CopyOptions::with_concurrency(args.concurrency),
    };

    let exported = workflow::export_archive(
        &ctx.cancel,
        &layout,
        &args.filename,
        &ctx.config.temp_dir,
        &options,
    )
    .await?;

    println!(
        "Exported {} reference(s) to {}",
        exported.len(),
        args.filename.display()
    );
    Ok(())
}
