//! Store local files as Files-kind artifacts.

use std::collections::BTreeMap;
use std::path::Path;

use freighter_core::consts;
use freighter_core::error::{FreighterError, Result};

use crate::layout::Layout;
use crate::oci::descriptor::{Descriptor, Manifest};
use crate::oci::reference::Reference;

/// Store the file at `path` and tag it `freighter/<name>:latest`.
///
/// `name` defaults to the file name, which also becomes the layer title and
/// therefore the name the file is extracted under.
pub async fn add_file(layout: &Layout, path: &Path, name: Option<&str>) -> Result<Descriptor> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FreighterError::InvalidPath(format!("{} has no file name", path.display())))?;
    let name = name.unwrap_or(&file_name);
    let reference = Reference::artifact(name)?;

    let data = tokio::fs::read(path).await.map_err(|e| {
        FreighterError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {}", path.display(), e),
        ))
    })?;

    let config = serde_json::json!({ "source": path.display().to_string() });
    let config = layout
        .put(
            &serde_json::to_vec(&config)?,
            consts::FILE_LOCAL_CONFIG_MEDIA_TYPE,
            BTreeMap::new(),
        )
        .await?;

    let mut layer_annotations = BTreeMap::new();
    layer_annotations.insert(consts::ANNOTATION_TITLE.to_string(), file_name.clone());
    let layer = layout
        .put(&data, consts::FILE_LAYER_MEDIA_TYPE, layer_annotations)
        .await?;

    let mut manifest = Manifest::new(config, vec![layer]);
    manifest.annotations.insert(
        consts::KIND_ANNOTATION_NAME.to_string(),
        consts::FILES_CONTENT_KIND.to_string(),
    );
    manifest.annotations.insert(
        consts::ANNOTATION_CREATED.to_string(),
        chrono::Utc::now().to_rfc3339(),
    );
    let manifest_desc = layout
        .put(&manifest.to_vec()?, manifest.media_type(), BTreeMap::new())
        .await?;

    let entry = layout.tag(&manifest_desc, &reference.full_reference()).await?;
    tracing::info!(
        reference = %reference,
        file = %path.display(),
        size = data.len(),
        digest = %entry.digest,
        "Added file to store"
    );
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_add_file_tags_artifact() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::open(tmp.path().join("store")).await.unwrap();
        let path = tmp.path().join("Install Guide.md");
        std::fs::write(&path, b"# steps").unwrap();

        let entry = add_file(&layout, &path, None).await.unwrap();
        assert_eq!(
            entry.ref_name(),
            Some("docker.io/freighter/install-guide.md:latest")
        );

        let manifest = Manifest::from_slice(&layout.fetch_bytes(&entry).await.unwrap()).unwrap();
        assert_eq!(
            manifest.annotation(consts::KIND_ANNOTATION_NAME),
            Some(consts::FILES_CONTENT_KIND)
        );
        assert_eq!(manifest.layers[0].title(), Some("Install Guide.md"));
        assert_eq!(
            layout.fetch_bytes(&manifest.layers[0]).await.unwrap(),
            b"# steps"
        );
    }

    #[tokio::test]
    async fn test_add_file_custom_name() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::open(tmp.path().join("store")).await.unwrap();
        let path = tmp.path().join("data.bin");
        std::fs::write(&path, b"\x00\x01").unwrap();

        add_file(&layout, &path, Some("firmware")).await.unwrap();
        assert!(layout.resolve("freighter/firmware").await.is_ok());
    }

    #[tokio::test]
    async fn test_add_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::open(tmp.path().join("store")).await.unwrap();
        let err = add_file(&layout, &tmp.path().join("nope.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FreighterError::IoError(_)));
    }
}
