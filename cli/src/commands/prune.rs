//! `freighter store prune` command - delete unreachable blobs.

use clap::Args;

use crate::output;

#[derive(Args)]
pub struct PruneArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

pub async fn execute(ctx: &super::Context, args: PruneArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;

    if !args.force {
        println!(
            "WARNING: This will delete every blob in {} not referenced by a stored artifact.",
            layout.root().display()
        );
        println!();
        println!("Use --force to skip this prompt.");
        return Ok(());
    }

    let report = layout.garbage_collect().await?;
    if report.removed == 0 {
        println!("Nothing to prune.");
    } else {
        println!(
            "Removed {} blob(s), freed {}",
            report.removed,
            output::format_bytes(report.reclaimed_bytes)
        );
    }
    Ok(())
}
