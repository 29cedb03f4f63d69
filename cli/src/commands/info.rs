//! `freighter store info` command.

use clap::Args;
use freighter_store::oci::descriptor::{document_shape, DocumentShape};
use freighter_core::error::Result;
use freighter_store::{ContentKind, Descriptor, Layout, Manifest, Reference};
use serde::Serialize;

use crate::output;

/// Kind shown for references whose content cannot be read.
const MISSING: &str = "<missing>";

#[derive(Args)]
pub struct InfoArgs {
    /// Only show references (one per line)
    #[arg(short, long)]
    pub quiet: bool,

    /// Format output using placeholders: {{.Reference}}, {{.Repository}},
    /// {{.Tag}}, {{.Kind}}, {{.Digest}}, {{.Size}}, {{.Layers}}
    #[arg(long)]
    pub format: Option<String>,

    /// Print the listing as JSON
    #[arg(long, conflicts_with_all = ["quiet", "format"])]
    pub json: bool,

    /// Only show references containing this text
    #[arg(short, long)]
    pub filter: Option<String>,
}

pub async fn execute(
    ctx: &super::Context,
    args: InfoArgs,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let layout = ctx.open_layout().await?;
    let references = layout.references().await?;
    let selected = references
        .iter()
        .filter(|(reference, _)| args.filter.as_deref().map_or(true, |f| reference.contains(f)));

    if args.quiet {
        for (reference, _) in selected {
            println!("{reference}");
        }
        return Ok(());
    }

    let mut rows = Vec::new();
    for (reference, desc) in selected {
        rows.push(StoreRow::describe(&layout, reference, desc).await);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if let Some(ref fmt) = args.format {
        for row in &rows {
            println!("{}", row.apply_format(fmt));
        }
        return Ok(());
    }

    let mut table = output::new_table(&["REPOSITORY", "TAG", "KIND", "LAYERS", "DIGEST", "SIZE"]);
    for row in &rows {
        table.add_row(&[
            &row.repository,
            &row.tag,
            &row.kind,
            &row.layers,
            &row.digest,
            &row.size,
        ]);
    }
    println!("{table}");
    println!();
    println!("Store: {} ({})", layout.root().display(), output::format_bytes(layout.size()));
    Ok(())
}

/// Pre-computed display fields for a single stored reference.
#[derive(Serialize)]
struct StoreRow {
    reference: String,
    repository: String,
    tag: String,
    kind: String,
    layers: String,
    digest: String,
    size: String,
}

impl StoreRow {
    /// Build the row for `reference`. Content that cannot be read or parsed
    /// is shown as missing rather than aborting the listing.
    async fn describe(layout: &Layout, reference: &str, desc: &Descriptor) -> Self {
        let (repository, tag) = match Reference::parse(reference) {
            Ok(r) => (
                format!("{}/{}", r.registry, r.repository),
                r.identifier().to_string(),
            ),
            Err(_) => (reference.to_string(), "<none>".to_string()),
        };

        let (kind, layers, size) = match Self::summarize(layout, desc).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    reference = %reference,
                    digest = %desc.digest,
                    error = %e,
                    "Unreadable stored content"
                );
                (MISSING.to_string(), "-".to_string(), desc.size)
            }
        };

        Self {
            reference: reference.to_string(),
            repository,
            tag,
            kind,
            layers,
            digest: output::short_digest(&desc.digest.to_string()),
            size: output::format_bytes(size),
        }
    }

    /// Kind, layer count and total size of the content behind `desc`.
    async fn summarize(layout: &Layout, desc: &Descriptor) -> Result<(String, String, u64)> {
        let data = layout.fetch_bytes(desc).await?;
        Ok(match document_shape(desc, &data) {
            DocumentShape::Manifest => {
                let manifest = Manifest::from_slice(&data)?;
                let size: u64 = manifest.blobs().map(|b| b.size).sum::<u64>() + desc.size;
                (
                    ContentKind::of(&manifest).to_string(),
                    manifest.layers.len().to_string(),
                    size,
                )
            }
            _ => ("index".to_string(), "-".to_string(), desc.size),
        })
    }

    /// Apply a format template, replacing `{{.Field}}` placeholders.
    fn apply_format(&self, fmt: &str) -> String {
        fmt.replace("{{.Reference}}", &self.reference)
            .replace("{{.Repository}}", &self.repository)
            .replace("{{.Tag}}", &self.tag)
            .replace("{{.Kind}}", &self.kind)
            .replace("{{.Digest}}", &self.digest)
            .replace("{{.Size}}", &self.size)
            .replace("{{.Layers}}", &self.layers)
    }
}
