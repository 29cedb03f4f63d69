//! Move a store across an air gap as a single zstd-compressed tarball.
//!
//! Export copies the selected references into a scratch layout, then packs
//! that layout. Import unpacks into scratch, then copies every reference into
//! the target store. Scratch directories live under the configured temp
//! directory and are removed when the operation ends, successful or not.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use freighter_core::error::{FreighterError, Result};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::copy::{self, cancellable, CopyOptions, Source};
use crate::fs::{io_context, TMP_SUFFIX};
use crate::layout::Layout;
use crate::oci::descriptor::{document_shape, Descriptor, DocumentShape, ImageIndex, Platform};

/// Marker every OCI layout carries at its root.
const LAYOUT_MARKER: &str = "oci-layout";

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Keep only the matching manifest of multi-platform images.
    pub platform: Option<Platform>,
    /// Only export references containing this text.
    pub only: Option<String>,
    pub copy: CopyOptions,
}

/// Pack the selected references of `layout` into `archive`.
///
/// The archive is written beside its final path and renamed into place, so
/// an interrupted export never leaves a truncated file behind.
pub async fn export_archive(
    cancel: &CancellationToken,
    layout: &Layout,
    archive: &Path,
    temp_dir: &Path,
    options: &ExportOptions,
) -> Result<Vec<(String, Descriptor)>> {
    let scratch = scratch_dir(temp_dir, "export-").await?;
    let staging = Layout::open(scratch.path())
        .await?
        .with_span(tracing::debug_span!("staging", root = %scratch.path().display()));

    let mut exported = Vec::new();
    for (reference, root) in layout.references().await? {
        if !options
            .only
            .as_deref()
            .map_or(true, |filter| reference.contains(filter))
        {
            continue;
        }
        let root = match &options.platform {
            Some(platform) => select_platform(layout, &reference, root, platform).await?,
            None => root,
        };
        let source = Pinned { layout, root };
        let desc =
            copy::copy(cancel, &source, &reference, &staging, &reference, &options.copy).await?;
        tracing::debug!(reference = %reference, digest = %desc.digest, "Staged reference");
        exported.push((reference, desc));
    }

    let parent = archive.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            io_context(e, format!("failed to create directory {}", parent.display()))
        })?;
    }
    let staged_root = scratch.path().to_path_buf();
    let target = archive.to_path_buf();
    cancellable(cancel, async move {
        tokio::task::spawn_blocking(move || pack(&staged_root, &target))
            .await
            .map_err(|e| FreighterError::Other(format!("Archive task failed: {}", e)))?
    })
    .await?;

    tracing::info!(
        archive = %archive.display(),
        references = exported.len(),
        "Exported store archive"
    );
    Ok(exported)
}

/// Unpack `archive` and copy every reference it holds into `layout`.
///
/// Blobs already present are skipped. Stops at the first failing reference;
/// references committed before it stay committed.
pub async fn import_archive(
    cancel: &CancellationToken,
    layout: &Layout,
    archive: &Path,
    temp_dir: &Path,
    options: &CopyOptions,
) -> Result<Vec<(String, Descriptor)>> {
    if !archive.is_file() {
        return Err(FreighterError::NotFound(format!(
            "archive {}",
            archive.display()
        )));
    }
    let scratch = scratch_dir(temp_dir, "import-").await?;

    let source = archive.to_path_buf();
    let dest = scratch.path().to_path_buf();
    cancellable(cancel, async move {
        tokio::task::spawn_blocking(move || unpack(&source, &dest))
            .await
            .map_err(|e| FreighterError::Other(format!("Archive task failed: {}", e)))?
    })
    .await?;

    if !scratch.path().join(LAYOUT_MARKER).is_file() {
        return Err(FreighterError::InvalidPath(format!(
            "{} is not a store archive: no {} at its root",
            archive.display(),
            LAYOUT_MARKER
        )));
    }
    let staging = Layout::open(scratch.path())
        .await?
        .with_span(tracing::debug_span!("staging", root = %scratch.path().display()));

    let mut imported = Vec::new();
    for (reference, _) in staging.references().await? {
        let desc = staging
            .copy_with_options(cancel, &reference, layout, &reference, options)
            .await?;
        tracing::debug!(reference = %reference, digest = %desc.digest, "Imported reference");
        imported.push((reference, desc));
    }

    tracing::info!(
        archive = %archive.display(),
        references = imported.len(),
        "Imported store archive"
    );
    Ok(imported)
}

/// Replace an image-index root with its entry for `platform`. Other roots
/// pass through unchanged.
async fn select_platform(
    layout: &Layout,
    reference: &str,
    root: Descriptor,
    platform: &Platform,
) -> Result<Descriptor> {
    let data = layout.fetch_bytes(&root).await?;
    if document_shape(&root, &data) != DocumentShape::Index {
        return Ok(root);
    }
    let index = ImageIndex::from_slice(&data)?;
    let selected = index
        .manifests
        .into_iter()
        .find(|entry| entry.platform().is_some_and(|p| platform.selects(&p)))
        .ok_or_else(|| {
            FreighterError::NotFound(format!(
                "{} has no manifest for platform {}",
                reference, platform
            ))
        })?;
    tracing::debug!(
        reference = %reference,
        platform = %platform,
        digest = %selected.digest,
        "Selected platform"
    );
    Ok(selected)
}

/// Serves one fixed root for any reference, with blobs from a layout.
struct Pinned<'a> {
    layout: &'a Layout,
    root: Descriptor,
}

#[async_trait]
impl Source for Pinned<'_> {
    async fn resolve(&self, _reference: &str) -> Result<Descriptor> {
        Ok(self.root.clone())
    }

    async fn fetch(&self, desc: &Descriptor) -> Result<Vec<u8>> {
        self.layout.fetch_bytes(desc).await
    }
}

async fn scratch_dir(temp_dir: &Path, prefix: &str) -> Result<TempDir> {
    tokio::fs::create_dir_all(temp_dir).await.map_err(|e| {
        io_context(e, format!("failed to create temp directory {}", temp_dir.display()))
    })?;
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(temp_dir)
        .map_err(|e| {
            io_context(
                e,
                format!("failed to create scratch directory in {}", temp_dir.display()),
            )
        })
}

fn pack(root: &Path, archive: &Path) -> Result<()> {
    let tmp_path = sibling_tmp(archive);
    let result = (|| -> std::io::Result<()> {
        let file = File::create(&tmp_path)?;
        let encoder = zstd::Encoder::new(file, 0)?;
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);
        builder.append_dir_all(".", root)?;
        let file = builder.into_inner()?.finish()?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, archive)
    })();

    result.map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        io_context(e, format!("failed to write archive {}", archive.display()))
    })
}

fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .map_err(|e| io_context(e, format!("failed to open archive {}", archive.display())))?;
    let decoder = zstd::Decoder::new(file)?;
    tar::Archive::new(decoder)
        .unpack(dest)
        .map_err(|e| io_context(e, format!("failed to unpack archive {}", archive.display())))
}

fn sibling_tmp(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}{}", name, uuid::Uuid::new_v4(), TMP_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::descriptor::Manifest;
    use crate::workflow::artifact::add_file;
    use freighter_core::consts;
    use std::collections::BTreeMap;

    async fn image(layout: &Layout, arch: &str) -> Descriptor {
        let config = layout
            .put(
                format!(r#"{{"architecture":"{arch}","os":"linux"}}"#).as_bytes(),
                consts::OCI_CONFIG_JSON,
                BTreeMap::new(),
            )
            .await
            .unwrap();
        let layer = layout
            .put(format!("{arch} layer").as_bytes(), consts::OCI_LAYER, BTreeMap::new())
            .await
            .unwrap();
        let manifest = Manifest::new(config, vec![layer]);
        let mut desc = layout
            .put(&manifest.to_vec().unwrap(), manifest.media_type(), BTreeMap::new())
            .await
            .unwrap();
        desc.platform = Some(Platform::parse(&format!("linux/{arch}")).unwrap());
        desc
    }

    async fn multi_arch(layout: &Layout, reference: &str) -> (Descriptor, Descriptor) {
        let amd64 = image(layout, "amd64").await;
        let arm64 = image(layout, "arm64").await;
        let index = ImageIndex {
            manifests: vec![amd64.clone(), arm64.clone()],
            ..Default::default()
        };
        let root = layout
            .put(
                &serde_json::to_vec(&index).unwrap(),
                consts::OCI_IMAGE_INDEX_SCHEMA,
                BTreeMap::new(),
            )
            .await
            .unwrap();
        layout.tag(&root, reference).await.unwrap();
        (amd64, arm64)
    }

    #[tokio::test]
    async fn test_export_then_import_into_empty_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let origin = Layout::open(tmp.path().join("origin")).await.unwrap();
        let notes = tmp.path().join("notes.txt");
        std::fs::write(&notes, b"ship it").unwrap();
        add_file(&origin, &notes, None).await.unwrap();
        multi_arch(&origin, "registry.local/app/web:v1").await;

        let archive = tmp.path().join("out").join(consts::DEFAULT_FREIGHTER_ARCHIVE_NAME);
        let scratch = tmp.path().join("scratch");
        let cancel = CancellationToken::new();
        let exported =
            export_archive(&cancel, &origin, &archive, &scratch, &ExportOptions::default())
                .await
                .unwrap();
        assert_eq!(exported.len(), 2);
        assert!(archive.is_file());
        // scratch is cleaned up and no temp archive is left beside the output
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(archive.parent().unwrap()).unwrap().count(), 1);

        let target = Layout::open(tmp.path().join("target")).await.unwrap();
        let imported =
            import_archive(&cancel, &target, &archive, &scratch, &CopyOptions::default())
                .await
                .unwrap();
        let names = |refs: &[(String, Descriptor)]| -> Vec<String> {
            refs.iter().map(|(r, _)| r.clone()).collect()
        };
        assert_eq!(names(&imported), names(&exported));
        for (reference, desc) in origin.references().await.unwrap() {
            let copied = target.resolve(&reference).await.unwrap();
            assert_eq!(copied.digest, desc.digest);
        }
    }

    #[tokio::test]
    async fn test_export_with_platform_keeps_one_manifest() {
        let tmp = tempfile::TempDir::new().unwrap();
        let origin = Layout::open(tmp.path().join("origin")).await.unwrap();
        let (_, arm64) = multi_arch(&origin, "registry.local/app/web:v1").await;

        let archive = tmp.path().join(consts::DEFAULT_FREIGHTER_ARCHIVE_NAME);
        let options = ExportOptions {
            platform: Some(Platform::parse("linux/arm64").unwrap()),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        export_archive(&cancel, &origin, &archive, &tmp.path().join("scratch"), &options)
            .await
            .unwrap();

        let target = Layout::open(tmp.path().join("target")).await.unwrap();
        let scratch = tmp.path().join("scratch");
        import_archive(&cancel, &target, &archive, &scratch, &CopyOptions::default())
            .await
            .unwrap();
        let stored = target.resolve("registry.local/app/web:v1").await.unwrap();
        assert_eq!(stored.digest, arm64.digest);
        // the other platform's layer never left the origin store
        let report = target.garbage_collect().await.unwrap();
        assert_eq!(report.removed, 0);
        let blobs = std::fs::read_dir(target.root().join("blobs/sha256")).unwrap();
        assert_eq!(blobs.count(), 3);
    }

    #[tokio::test]
    async fn test_export_unknown_platform_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let origin = Layout::open(tmp.path().join("origin")).await.unwrap();
        multi_arch(&origin, "registry.local/app/web:v1").await;

        let archive = tmp.path().join(consts::DEFAULT_FREIGHTER_ARCHIVE_NAME);
        let options = ExportOptions {
            platform: Some(Platform::parse("linux/s390x").unwrap()),
            ..Default::default()
        };
        let err = export_archive(
            &CancellationToken::new(),
            &origin,
            &archive,
            &tmp.path().join("scratch"),
            &options,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FreighterError::NotFound(_)));
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn test_import_rejects_non_store_archive() {
        let tmp = tempfile::TempDir::new().unwrap();
        let loose = tmp.path().join("loose");
        std::fs::create_dir_all(&loose).unwrap();
        std::fs::write(loose.join("readme.md"), b"not a store").unwrap();
        let archive = tmp.path().join("loose.tar.zst");
        pack(&loose, &archive).unwrap();

        let target = Layout::open(tmp.path().join("target")).await.unwrap();
        let err = import_archive(
            &CancellationToken::new(),
            &target,
            &archive,
            &tmp.path().join("scratch"),
            &CopyOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FreighterError::InvalidPath(_)));
        assert!(target.references().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_missing_archive_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let target = Layout::open(tmp.path().join("target")).await.unwrap();
        let err = import_archive(
            &CancellationToken::new(),
            &target,
            &tmp.path().join(consts::DEFAULT_FREIGHTER_ARCHIVE_NAME),
            &tmp.path().join("scratch"),
            &CopyOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FreighterError::NotFound(_)));
    }
}
