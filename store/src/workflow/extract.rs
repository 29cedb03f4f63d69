//! Extract stored content into a directory.

use std::path::Path;

use freighter_core::error::{FreighterError, Result};
use tokio_util::sync::CancellationToken;

use crate::copy::CopyOptions;
use crate::layout::Layout;
use crate::mapper::{self, MapperOptions};
use crate::oci::descriptor::{document_shape, Descriptor, DocumentShape, Manifest};
use crate::oci::reference::Reference;

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub mapper: MapperOptions,
    pub copy: CopyOptions,
}

/// Materialize every stored reference matching `reference` under
/// `destination`.
///
/// Matching uses the repository plus identifier of the parsed reference, so
/// `nginx:1.25` extracts `docker.io/library/nginx:1.25` from the store.
/// Returns the descriptors produced by each projection.
pub async fn extract(
    cancel: &CancellationToken,
    layout: &Layout,
    reference: &str,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<Vec<Descriptor>> {
    let parsed = Reference::parse(reference)?;

    let mut matches = Vec::new();
    layout
        .walk(|stored, desc| {
            if parsed.matches(stored) {
                matches.push((stored.to_string(), desc.clone()));
            }
            Ok(())
        })
        .await?;

    if matches.is_empty() {
        return Err(FreighterError::NotFound(format!(
            "reference [{}] not found in store (hint: use `freighter store info` to list store contents)",
            reference
        )));
    }

    let mut extracted = Vec::with_capacity(matches.len());
    for (stored, desc) in matches {
        let data = layout.fetch_bytes(&desc).await?;
        if document_shape(&desc, &data) != DocumentShape::Manifest {
            return Err(FreighterError::UnsupportedKind(format!(
                "{} is an image index; extract a single-platform reference",
                stored
            )));
        }
        let manifest = Manifest::from_slice(&data)?;

        let sink = mapper::from_manifest(&manifest, destination, &options.mapper)?;
        let pushed = layout
            .copy_with_options(cancel, &stored, &sink, "", &options.copy)
            .await?;

        tracing::info!(
            reference = %stored,
            kind = %sink.kind(),
            media_type = %pushed.media_type,
            digest = %pushed.digest,
            destination = %destination.display(),
            "Extracted content from store"
        );
        extracted.push(pushed);
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::artifact::add_file;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_file_artifact() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::open(tmp.path().join("store")).await.unwrap();
        let source = tmp.path().join("notes.txt");
        std::fs::write(&source, b"remember the milk").unwrap();
        add_file(&layout, &source, None).await.unwrap();

        let dest = tmp.path().join("out");
        let extracted = extract(
            &CancellationToken::new(),
            &layout,
            "freighter/notes.txt",
            &dest,
            &ExtractOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(extracted.len(), 1);
        assert_eq!(
            std::fs::read(dest.join("notes.txt")).unwrap(),
            b"remember the milk"
        );
    }

    #[tokio::test]
    async fn test_extract_unknown_reference_has_hint() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::open(tmp.path().join("store")).await.unwrap();
        let err = extract(
            &CancellationToken::new(),
            &layout,
            "ns/missing:v1",
            tmp.path(),
            &ExtractOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FreighterError::NotFound(_)));
        assert!(err.to_string().contains("freighter store info"));
    }

    #[tokio::test]
    async fn test_extract_invalid_reference() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::open(tmp.path().join("store")).await.unwrap();
        let err = extract(
            &CancellationToken::new(),
            &layout,
            "",
            tmp.path(),
            &ExtractOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FreighterError::InvalidReference { .. }));
    }
}
