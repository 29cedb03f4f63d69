//! `freighter store remove` command - drop references from the store.

use clap::Args;

#[derive(Args)]
pub struct RemoveArgs {
    /// References to remove
    #[arg(required = true)]
    pub references: Vec<String>,

    /// Ignore references that are not in the store
    #[arg(short, long)]
    pub force: bool,
}

pub async fn execute(ctx: &super::Context, args: RemoveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;

    let mut errors: Vec<String> = Vec::new();
    for reference in &args.references {
        match layout.remove(reference).await {
            Ok(desc) => println!("Removed: {reference} ({})", desc.digest),
            Err(e) => {
                if args.force {
                    continue;
                }
                errors.push(format!("{reference}: {e}"));
            }
        }
    }

    if errors.is_empty() {
        println!("Run `freighter store prune --force` to reclaim space.");
        Ok(())
    } else {
        let msg = errors.join("\n");
        Err(format!("Failed to remove reference(s):\n{msg}").into())
    }
}
