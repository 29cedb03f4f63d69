//! Copy engine.
//!
//! Streams a manifest and everything it references from a [`Source`] into a
//! [`Sink`], then commits the destination reference. The commit happens
//! strictly after every referenced blob has been accepted by the sink, so a
//! failed or cancelled copy never leaves a reference pointing at missing
//! content.

use std::collections::HashSet;
use std::future::Future;

use async_trait::async_trait;
use freighter_core::error::{FreighterError, Result};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, TryStreamExt};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::oci::descriptor::{document_shape, Descriptor, DocumentShape, ImageIndex, Manifest};

/// Owned reader over a blob. The underlying handle is released on drop.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Anything content can be copied out of.
#[async_trait]
pub trait Source: Send + Sync {
    /// Resolve a reference to its top-level descriptor.
    async fn resolve(&self, reference: &str) -> Result<Descriptor>;

    /// Read the complete content of a blob.
    async fn fetch(&self, desc: &Descriptor) -> Result<Vec<u8>>;
}

/// Anything content can be copied into.
///
/// `push` accepts one descriptor plus its bytes; `commit` is called once,
/// after every blob reachable from `root` has been pushed, and returns the
/// top-level descriptor of the materialized result.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Whether the sink already holds this blob. Blobs it holds are skipped.
    async fn exists(&self, _desc: &Descriptor) -> Result<bool> {
        Ok(false)
    }

    async fn push(&self, desc: &Descriptor, data: Vec<u8>) -> Result<()>;

    async fn commit(&self, root: &Descriptor, reference: &str) -> Result<Descriptor>;
}

/// Copy tuning.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Maximum number of blobs transferred at once.
    pub concurrency: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl CopyOptions {
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

/// Copy `source_ref` from `source` into `sink`, committing it as `dest_ref`
/// (or `source_ref` when `dest_ref` is empty).
pub async fn copy<S, D>(
    cancel: &CancellationToken,
    source: &S,
    source_ref: &str,
    sink: &D,
    dest_ref: &str,
    options: &CopyOptions,
) -> Result<Descriptor>
where
    S: Source + ?Sized,
    D: Sink + ?Sized,
{
    let root = cancellable(cancel, source.resolve(source_ref)).await?;
    let target = if dest_ref.is_empty() { source_ref } else { dest_ref };

    tracing::debug!(
        source = %source_ref,
        target = %target,
        digest = %root.digest,
        media_type = %root.media_type,
        "Copying reference"
    );

    let ctx = Transfer {
        cancel,
        source,
        sink,
        reference: target,
        concurrency: options.concurrency.max(1),
    };
    ctx.node(&root).await?;

    let committed = cancellable(cancel, sink.commit(&root, target)).await?;

    tracing::info!(
        target = %target,
        digest = %committed.digest,
        "Committed reference"
    );
    Ok(committed)
}

/// Race `fut` against cancellation.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FreighterError::Cancelled),
        result = fut => result,
    }
}

struct Transfer<'a, S: ?Sized, D: ?Sized> {
    cancel: &'a CancellationToken,
    source: &'a S,
    sink: &'a D,
    reference: &'a str,
    concurrency: usize,
}

impl<'a, S, D> Transfer<'a, S, D>
where
    S: Source + ?Sized,
    D: Sink + ?Sized,
{
    /// Transfer a manifest or index and everything beneath it, children first.
    fn node<'b>(&'b self, desc: &'b Descriptor) -> BoxFuture<'b, Result<()>> {
        async move {
            let data = self.fetch_verified(desc).await?;

            match document_shape(desc, &data) {
                DocumentShape::Index => {
                    let index = ImageIndex::from_slice(&data).map_err(|e| self.partial(desc, e))?;
                    for child in &index.manifests {
                        self.node(child).await?;
                    }
                }
                DocumentShape::Manifest => {
                    let manifest = Manifest::from_slice(&data).map_err(|e| self.partial(desc, e))?;
                    self.leaves(&manifest).await?;
                }
                DocumentShape::Blob => {}
            }

            if !self.sink_has(desc).await? {
                cancellable(self.cancel, self.sink.push(desc, data))
                    .await
                    .map_err(|e| self.partial(desc, e))?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Transfer config and layers, deduplicated, with bounded concurrency.
    async fn leaves(&self, manifest: &Manifest) -> Result<()> {
        let mut seen = HashSet::new();
        let pending: Vec<&Descriptor> = manifest
            .blobs()
            .filter(|d| seen.insert(d.digest.clone()))
            .collect();

        let transfers: Vec<BoxFuture<'_, Result<()>>> =
            pending.into_iter().map(|desc| self.blob(desc).boxed()).collect();

        futures::stream::iter(transfers)
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }

    async fn blob(&self, desc: &Descriptor) -> Result<()> {
        if self.sink_has(desc).await? {
            tracing::trace!(digest = %desc.digest, "Blob already present at destination");
            return Ok(());
        }

        let data = self.fetch_verified(desc).await?;
        cancellable(self.cancel, self.sink.push(desc, data))
            .await
            .map_err(|e| self.partial(desc, e))?;

        tracing::debug!(
            digest = %desc.digest,
            size = desc.size,
            media_type = %desc.media_type,
            "Transferred blob"
        );
        Ok(())
    }

    async fn sink_has(&self, desc: &Descriptor) -> Result<bool> {
        cancellable(self.cancel, self.sink.exists(desc))
            .await
            .map_err(|e| self.partial(desc, e))
    }

    async fn fetch_verified(&self, desc: &Descriptor) -> Result<Vec<u8>> {
        let data = cancellable(self.cancel, self.source.fetch(desc))
            .await
            .map_err(|e| self.partial(desc, e))?;
        desc.verify(&data)?;
        Ok(data)
    }

    /// Wrap a per-blob failure. Cancellation, integrity violations and
    /// already-wrapped failures keep their own kind.
    fn partial(&self, desc: &Descriptor, err: FreighterError) -> FreighterError {
        match err {
            FreighterError::Cancelled
            | FreighterError::DigestMismatch { .. }
            | FreighterError::PartialTransfer { .. } => err,
            other => FreighterError::PartialTransfer {
                reference: self.reference.to_string(),
                digest: desc.digest.to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory source and sink used by tests across the crate.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::oci::digest::Digest;

    #[derive(Default)]
    pub struct MemorySource {
        pub refs: HashMap<String, Descriptor>,
        pub blobs: HashMap<Digest, Vec<u8>>,
        /// Digests whose fetch fails.
        pub broken: HashSet<Digest>,
        pub fetches: AtomicUsize,
    }

    impl MemorySource {
        pub fn add(&mut self, desc: &Descriptor, data: Vec<u8>) {
            self.blobs.insert(desc.digest.clone(), data);
        }
    }

    #[async_trait]
    impl Source for MemorySource {
        async fn resolve(&self, reference: &str) -> Result<Descriptor> {
            self.refs
                .get(reference)
                .cloned()
                .ok_or_else(|| FreighterError::NotFound(reference.to_string()))
        }

        async fn fetch(&self, desc: &Descriptor) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.broken.contains(&desc.digest) {
                return Err(FreighterError::IoError(std::io::Error::other(
                    "connection reset",
                )));
            }
            self.blobs
                .get(&desc.digest)
                .cloned()
                .ok_or_else(|| FreighterError::NotFound(desc.digest.to_string()))
        }
    }

    #[derive(Default)]
    pub struct MemorySink {
        pub pushed: Mutex<Vec<Descriptor>>,
        pub committed: Mutex<Vec<(String, Descriptor)>>,
    }

    #[async_trait]
    impl Sink for MemorySink {
        async fn exists(&self, desc: &Descriptor) -> Result<bool> {
            Ok(self
                .pushed
                .lock()
                .unwrap()
                .iter()
                .any(|d| d.digest == desc.digest))
        }

        async fn push(&self, desc: &Descriptor, _data: Vec<u8>) -> Result<()> {
            self.pushed.lock().unwrap().push(desc.clone());
            Ok(())
        }

        async fn commit(&self, root: &Descriptor, reference: &str) -> Result<Descriptor> {
            self.committed
                .lock()
                .unwrap()
                .push((reference.to_string(), root.clone()));
            Ok(root.clone())
        }
    }
}
