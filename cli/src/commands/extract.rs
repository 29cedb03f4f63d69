//! `freighter store extract` command.

use std::path::PathBuf;

use clap::Args;
use freighter_store::workflow::{self, ExtractOptions};
use freighter_store::{CopyOptions, MapperOptions};

#[derive(Args)]
pub struct ExtractArgs {
    /// Reference of the stored artifact (e.g., "nginx:1.25", "freighter/notes.txt")
    pub reference: String,

    /// Directory to extract into
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Write layers of unknown content kinds as plain files
    #[arg(long)]
    pub passthrough: bool,

    /// Also apply image layers to a rootfs/ directory
    #[arg(long)]
    pub unpack: bool,

    /// Number of blobs transferred at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

pub async fn execute(ctx: &super::Context, args: ExtractArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;
    let options = ExtractOptions {
        mapper: MapperOptions {
            passthrough: args.passthrough,
            unpack_layers: args.unpack,
        },
        copy: CopyOptions::with_concurrency(args.concurrency),
    };

    let extracted =
        workflow::extract(&ctx.cancel, &layout, &args.reference, &args.output, &options).await?;

    for desc in &extracted {
        println!(
            "Extracted: {} -> {} ({})",
            args.reference,
            args.output.display(),
            desc.digest
        );
    }
    Ok(())
}
