//! `freighter store save` command - pull artifacts from a registry into the store.

use clap::Args;
use freighter_store::workflow;
use freighter_store::{CopyOptions, RegistryAuth};

#[derive(Args)]
pub struct SaveArgs {
    /// Artifact references (e.g., "alpine:3.19", "ghcr.io/org/chart@sha256:...")
    #[arg(required = true)]
    pub references: Vec<String>,

    /// Registry username (default: $REGISTRY_USERNAME)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Registry password (default: $REGISTRY_PASSWORD)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Number of blobs transferred at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(ctx: &super::Context, args: SaveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;
    let retry = ctx.retry();
    let options = CopyOptions::with_concurrency(args.concurrency);

    for reference in &args.references {
        let auth = RegistryAuth::resolve(args.username.clone(), args.password.clone());
        if !args.quiet {
            println!("Saving {reference}...");
        }
        let desc =
            workflow::save_artifact(&ctx.cancel, &layout, reference, auth, &retry, &options).await?;
        if args.quiet {
            println!("{}", desc.digest);
        } else {
            println!("Saved: {reference} ({})", desc.digest);
        }
    }
    Ok(())
}
