//! Disk-based, OCI-layout-compatible content store.
//!
//! ```text
//! store/
//! ├── oci-layout           (OCI layout marker)
//! ├── index.json           (reference index)
//! └── blobs/
//!     └── sha256/
//!         └── <hex>        (manifests, configs, layers)
//! ```
//!
//! Blobs are content-addressed and written only if absent, so concurrent
//! puts of identical bytes are harmless. The reference index is replaced
//! atomically; in-process writers are serialized, cross-process writers to
//! the same reference are last-write-wins.

mod index;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use freighter_core::error::{FreighterError, Result};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::copy::{self, BlobReader, CopyOptions, Sink, Source};
use crate::fs::{dir_size, write_atomic, TMP_SUFFIX};
use crate::oci::descriptor::{document_shape, Descriptor, DocumentShape, ImageIndex, Manifest};
use crate::oci::digest::Digest;
use crate::oci::reference::Reference;

const OCI_LAYOUT_FILE: &str = "oci-layout";
const OCI_LAYOUT_CONTENT: &str = r#"{"imageLayoutVersion":"1.0.0"}"#;
const BLOBS_DIR: &str = "blobs";

/// Outcome of a garbage collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Blobs and stale temporary files deleted
    pub removed: usize,
    /// Bytes freed
    pub reclaimed_bytes: u64,
}

/// Content store rooted at one directory.
pub struct Layout {
    /// Root directory of the layout
    root: PathBuf,
    /// Serializes read-modify-write cycles on `index.json` within this process
    index_lock: Mutex<()>,
    /// Span every store operation is recorded under
    span: tracing::Span,
}

impl Layout {
    /// Open a layout, creating its skeleton on first use.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join(BLOBS_DIR))
            .await
            .map_err(|e| {
                FreighterError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create store directory {}: {}", root.display(), e),
                ))
            })?;

        create_if_absent(&root.join(OCI_LAYOUT_FILE), OCI_LAYOUT_CONTENT.as_bytes()).await?;
        let empty = serde_json::to_vec_pretty(&ImageIndex::default())?;
        create_if_absent(&index::index_path(&root), &empty).await?;

        let span = tracing::info_span!("layout", root = %root.display());
        Ok(Self {
            root,
            index_lock: Mutex::new(()),
            span,
        })
    }

    /// Record this layout's operations under `span` instead of the default.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Physical location of a blob: `blobs/<algorithm>/<hex>`.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root
            .join(BLOBS_DIR)
            .join(digest.algorithm())
            .join(digest.hex())
    }

    /// Store `data` and describe it.
    ///
    /// Writing is skipped when the blob is already present.
    pub async fn put(
        &self,
        data: &[u8],
        media_type: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<Descriptor> {
        let mut desc = Descriptor::for_bytes(media_type, data);
        desc.annotations = annotations;
        self.write_blob(&desc.digest, data)
            .instrument(self.span.clone())
            .await?;
        Ok(desc)
    }

    /// Store `data`, failing with `DigestMismatch` unless it hashes to
    /// `expected`.
    pub async fn put_verified(
        &self,
        data: &[u8],
        media_type: &str,
        annotations: BTreeMap<String, String>,
        expected: &Digest,
    ) -> Result<Descriptor> {
        expected.verify(data)?;
        self.put(data, media_type, annotations).await
    }

    pub async fn exists(&self, digest: &Digest) -> bool {
        tokio::fs::try_exists(self.blob_path(digest))
            .await
            .unwrap_or(false)
    }

    /// Open a blob for streaming. The reader releases the file when dropped.
    pub async fn fetch(&self, desc: &Descriptor) -> Result<BlobReader> {
        let path = self.blob_path(&desc.digest);
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FreighterError::NotFound(format!("blob {}", desc.digest)))
            }
            Err(e) => Err(FreighterError::IoError(e)),
        }
    }

    /// Read a whole blob and check it still hashes to its digest.
    pub async fn fetch_bytes(&self, desc: &Descriptor) -> Result<Vec<u8>> {
        let path = self.blob_path(&desc.digest);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FreighterError::NotFound(format!("blob {}", desc.digest)))
            }
            Err(e) => return Err(FreighterError::IoError(e)),
        };
        desc.digest.verify(&data)?;
        Ok(data)
    }

    /// Visit every reference exactly once, sorted by reference. Stops at and
    /// returns the first error `visit` produces.
    pub async fn walk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &Descriptor) -> Result<()>,
    {
        for (reference, desc) in self.references().await? {
            visit(&reference, &desc)?;
        }
        Ok(())
    }

    /// Snapshot of the reference index, sorted by reference.
    pub async fn references(&self) -> Result<Vec<(String, Descriptor)>> {
        let index = index::load(&self.root).await?;
        let mut entries: Vec<(String, Descriptor)> = index
            .manifests
            .into_iter()
            .map(|d| (index::entry_name(&d), d))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);
        Ok(entries)
    }

    /// Look up the top-level descriptor for `reference`.
    pub async fn resolve(&self, reference: &str) -> Result<Descriptor> {
        let key = normalize(reference)?;
        let index = index::load(&self.root).await?;
        index::find(&index, &key)
            .or_else(|| index::find(&index, reference))
            .cloned()
            .ok_or_else(|| FreighterError::NotFound(format!("reference {}", reference)))
    }

    /// Point `reference` at `desc`.
    ///
    /// Refuses with `PartialTransfer` unless the manifest and everything it
    /// references are already stored, so the index never names missing
    /// content.
    pub async fn tag(&self, desc: &Descriptor, reference: &str) -> Result<Descriptor> {
        let key = normalize(reference)?;
        self.ensure_complete(desc, &key).await?;

        let _guard = self.index_lock.lock().await;
        let mut index = index::load(&self.root).await?;
        let entry = index::upsert(&mut index, desc, &key);
        index::save(&self.root, &mut index).await?;

        tracing::debug!(parent: &self.span, reference = %key, digest = %desc.digest, "Tagged reference");
        Ok(entry)
    }

    /// Drop the index entry for `reference`. Blobs stay until garbage
    /// collection.
    pub async fn remove(&self, reference: &str) -> Result<Descriptor> {
        let key = normalize(reference)?;
        let _guard = self.index_lock.lock().await;
        let mut index = index::load(&self.root).await?;
        let removed = index::remove(&mut index, &key)
            .or_else(|| index::remove(&mut index, reference))
            .ok_or_else(|| FreighterError::NotFound(format!("reference {}", reference)))?;
        index::save(&self.root, &mut index).await?;

        tracing::info!(parent: &self.span, reference = %key, "Removed reference");
        Ok(removed)
    }

    /// Delete blobs unreachable from the reference index, plus leftover
    /// temporary files from interrupted writes.
    ///
    /// Only safe while no other process is mid-copy into this layout.
    pub async fn garbage_collect(&self) -> Result<GcReport> {
        let _guard = self.index_lock.lock().await;
        let index = index::load(&self.root).await?;

        let mut reachable = HashSet::new();
        for desc in &index.manifests {
            self.mark(desc, &mut reachable).await;
        }

        let mut report = GcReport::default();
        let blobs_dir = self.root.join(BLOBS_DIR);
        let mut algorithms = tokio::fs::read_dir(&blobs_dir).await?;
        while let Some(alg_entry) = algorithms.next_entry().await? {
            if !alg_entry.file_type().await?.is_dir() {
                continue;
            }
            let algorithm = alg_entry.file_name().to_string_lossy().into_owned();
            let mut blobs = tokio::fs::read_dir(alg_entry.path()).await?;
            while let Some(blob) = blobs.next_entry().await? {
                let name = blob.file_name().to_string_lossy().into_owned();
                let keep = !name.ends_with(TMP_SUFFIX)
                    && Digest::parse(&format!("{}:{}", algorithm, name))
                        .map(|d| reachable.contains(&d))
                        .unwrap_or(false);
                if keep {
                    continue;
                }
                let size = blob.metadata().await.map(|m| m.len()).unwrap_or(0);
                tokio::fs::remove_file(blob.path()).await?;
                report.removed += 1;
                report.reclaimed_bytes += size;
            }
        }

        tracing::info!(
            parent: &self.span,
            removed = report.removed,
            reclaimed_bytes = report.reclaimed_bytes,
            "Garbage collected store"
        );
        Ok(report)
    }

    /// Copy `source_ref` from this store into `sink` as `dest_ref`.
    pub async fn copy<D>(
        &self,
        cancel: &CancellationToken,
        source_ref: &str,
        sink: &D,
        dest_ref: &str,
    ) -> Result<Descriptor>
    where
        D: Sink + ?Sized,
    {
        self.copy_with_options(cancel, source_ref, sink, dest_ref, &CopyOptions::default())
            .await
    }

    pub async fn copy_with_options<D>(
        &self,
        cancel: &CancellationToken,
        source_ref: &str,
        sink: &D,
        dest_ref: &str,
        options: &CopyOptions,
    ) -> Result<Descriptor>
    where
        D: Sink + ?Sized,
    {
        copy::copy(cancel, self, source_ref, sink, dest_ref, options)
            .instrument(self.span.clone())
            .await
    }

    /// Total bytes on disk.
    pub fn size(&self) -> u64 {
        dir_size(&self.root)
    }

    async fn write_blob(&self, digest: &Digest, data: &[u8]) -> Result<bool> {
        let path = self.blob_path(digest);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::trace!(digest = %digest, "Blob already stored");
            return Ok(false);
        }
        write_atomic(&path, data).await?;
        tracing::debug!(digest = %digest, size = data.len(), "Stored blob");
        Ok(true)
    }

    /// Check that `desc` and everything beneath it are stored.
    async fn ensure_complete(&self, desc: &Descriptor, reference: &str) -> Result<()> {
        let missing = |d: &Descriptor| FreighterError::PartialTransfer {
            reference: reference.to_string(),
            digest: d.digest.to_string(),
            message: "blob missing from store".to_string(),
        };

        let mut stack = vec![desc.clone()];
        while let Some(node) = stack.pop() {
            let data = match self.fetch_bytes(&node).await {
                Ok(data) => data,
                Err(FreighterError::NotFound(_)) => return Err(missing(&node)),
                Err(e) => return Err(e),
            };
            match document_shape(&node, &data) {
                DocumentShape::Index => {
                    stack.extend(ImageIndex::from_slice(&data)?.manifests);
                }
                DocumentShape::Manifest => {
                    for blob in Manifest::from_slice(&data)?.blobs() {
                        if !self.exists(&blob.digest).await {
                            return Err(missing(blob));
                        }
                    }
                }
                DocumentShape::Blob => {}
            }
        }
        Ok(())
    }

    /// Collect every digest reachable from `desc`. Missing or unreadable
    /// nodes are skipped.
    async fn mark(&self, desc: &Descriptor, reachable: &mut HashSet<Digest>) {
        let mut stack = vec![desc.clone()];
        while let Some(node) = stack.pop() {
            if !reachable.insert(node.digest.clone()) {
                continue;
            }
            let Ok(data) = tokio::fs::read(self.blob_path(&node.digest)).await else {
                continue;
            };
            match document_shape(&node, &data) {
                DocumentShape::Index => {
                    if let Ok(index) = ImageIndex::from_slice(&data) {
                        stack.extend(index.manifests);
                    }
                }
                DocumentShape::Manifest => {
                    if let Ok(manifest) = Manifest::from_slice(&data) {
                        reachable.extend(manifest.blobs().map(|d| d.digest.clone()));
                    }
                }
                DocumentShape::Blob => {}
            }
        }
    }
}

#[async_trait]
impl Source for Layout {
    async fn resolve(&self, reference: &str) -> Result<Descriptor> {
        Layout::resolve(self, reference).await
    }

    async fn fetch(&self, desc: &Descriptor) -> Result<Vec<u8>> {
        self.fetch_bytes(desc).await
    }
}

#[async_trait]
impl Sink for Layout {
    async fn exists(&self, desc: &Descriptor) -> Result<bool> {
        Ok(Layout::exists(self, &desc.digest).await)
    }

    async fn push(&self, desc: &Descriptor, data: Vec<u8>) -> Result<()> {
        desc.verify(&data)?;
        self.write_blob(&desc.digest, &data).await?;
        Ok(())
    }

    async fn commit(&self, root: &Descriptor, reference: &str) -> Result<Descriptor> {
        self.tag(root, reference).await
    }
}

/// Canonical index key: the fully qualified reference.
fn normalize(reference: &str) -> Result<String> {
    Ok(Reference::parse(reference)?.full_reference())
}

async fn create_if_absent(path: &Path, data: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(mut file) => {
            file.write_all(data).await?;
            file.sync_all().await?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(FreighterError::IoError(e)),
    }
}
