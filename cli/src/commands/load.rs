//! `freighter store load` command - push stored artifacts to a registry.

use std::sync::Arc;

use clap::Args;
use freighter_store::workflow;
use freighter_store::{CopyOptions, RegistryAuth, RegistryClient};

#[derive(Args)]
pub struct LoadArgs {
    /// Destination registry host (e.g., "registry.internal:5000")
    pub registry: String,

    /// Only push references containing this text
    #[arg(short, long)]
    pub only: Option<String>,

    /// Registry username (default: $REGISTRY_USERNAME)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Registry password (default: $REGISTRY_PASSWORD)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Talk plain HTTP to the registry
    #[arg(long)]
    pub insecure: bool,

    /// Number of blobs transferred at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

pub async fn execute(ctx: &super::Context, args: LoadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;
    let auth = RegistryAuth::resolve(args.username, args.password);
    let client = Arc::new(if args.insecure {
        RegistryClient::insecure(args.registry.clone(), auth)
    } else {
        RegistryClient::new(args.registry.clone(), auth)
    });
    let options = CopyOptions::with_concurrency(args.concurrency);

    let loaded = ctx
        .retry()
        .run_retryable(&ctx.cancel, || {
            workflow::load_artifacts(&ctx.cancel, &layout, &client, args.only.as_deref(), &options)
        })
        .await?;

    if loaded.is_empty() {
        println!("Nothing to load.");
        return Ok(());
    }
    for (reference, desc) in &loaded {
        println!("Loaded: {reference} -> {} ({})", args.registry, desc.digest);
    }
    Ok(())
}
