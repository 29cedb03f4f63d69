//! Content mapper.
//!
//! Projects a manifest's blobs into a destination directory. The projection
//! is chosen from the manifest's content kind; the resulting [`MappedSink`]
//! is handed to the copy engine like any other sink.

pub mod kind;
pub mod projection;
pub mod unpack;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use freighter_core::consts;
use freighter_core::error::{FreighterError, Result};
use parking_lot::Mutex;

use crate::copy::Sink;
use crate::fs::write_atomic;
use crate::oci::descriptor::{document_shape, Descriptor, DocumentShape, Manifest};
use crate::oci::digest::Digest;

pub use kind::{ContentKind, LayerEncoding};
pub use projection::Projection;
use projection::Target;

/// Directory layers are unpacked into when requested.
pub const ROOTFS_DIR: &str = "rootfs";

/// Mapper behavior switches.
#[derive(Debug, Clone, Default)]
pub struct MapperOptions {
    /// Materialize unknown kinds layer-by-layer instead of failing.
    pub passthrough: bool,
    /// For images, also apply the layers to `rootfs/` on commit.
    pub unpack_layers: bool,
}

/// Select a projection for `manifest` and build a sink writing under `root`.
///
/// Fails with `UnsupportedKind` for unknown kinds unless passthrough is
/// enabled, and with `InvalidPath` when a descriptor names a file outside
/// `root`. Nothing is written until the copy engine pushes blobs.
pub fn from_manifest(
    manifest: &Manifest,
    root: impl AsRef<Path>,
    options: &MapperOptions,
) -> Result<MappedSink> {
    let root = root.as_ref().to_path_buf();
    let kind = ContentKind::of(manifest);
    let projection = match (Projection::for_kind(kind), options.passthrough) {
        (Some(projection), _) => projection,
        (None, true) => Projection::Passthrough,
        (None, false) => {
            return Err(FreighterError::UnsupportedKind(format!(
                "no mapping for config media type '{}'",
                manifest.config.media_type
            )))
        }
    };
    let targets = projection::plan(projection, manifest, &root)?;

    tracing::debug!(
        kind = %kind,
        ?projection,
        root = %root.display(),
        files = targets.len(),
        "Mapped manifest"
    );

    Ok(MappedSink {
        projection,
        kind,
        span: tracing::debug_span!("mapped_sink", kind = %kind, root = %root.display()),
        root,
        manifest: manifest.clone(),
        targets,
        unpack_layers: options.unpack_layers && projection == Projection::Image,
        written: Mutex::new(HashSet::new()),
    })
}

/// Filesystem sink for one manifest.
#[derive(Debug)]
pub struct MappedSink {
    projection: Projection,
    kind: ContentKind,
    root: PathBuf,
    manifest: Manifest,
    targets: Vec<Target>,
    unpack_layers: bool,
    /// Digests already materialized
    written: Mutex<HashSet<Digest>>,
    span: tracing::Span,
}

impl MappedSink {
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files this sink writes, in manifest order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.targets.iter().map(|t| t.path.as_path())
    }

    async fn unpack(&self) -> Result<()> {
        let rootfs = self.root.join(ROOTFS_DIR);
        for layer in &self.manifest.layers {
            let encoding = LayerEncoding::from_media_type(&layer.media_type);
            let archive = self
                .root
                .join(format!("{}{}", layer.digest.hex(), encoding.extension()));
            let target = rootfs.clone();
            tokio::task::spawn_blocking(move || unpack::unpack_layer(&archive, encoding, &target))
                .await
                .map_err(|e| FreighterError::Other(format!("Layer unpack task failed: {}", e)))??;
        }
        tracing::info!(parent: &self.span, rootfs = %rootfs.display(), layers = self.manifest.layers.len(), "Unpacked layers");
        Ok(())
    }
}

#[async_trait]
impl Sink for MappedSink {
    async fn push(&self, desc: &Descriptor, data: Vec<u8>) -> Result<()> {
        let mut matched = false;
        for target in self.targets.iter().filter(|t| t.digest == desc.digest) {
            write_atomic(&target.path, &data).await?;
            tracing::debug!(parent: &self.span, digest = %desc.digest, path = %target.path.display(), "Wrote file");
            matched = true;
        }

        if !matched
            && self.projection == Projection::Image
            && document_shape(desc, &data) == DocumentShape::Manifest
        {
            write_atomic(&self.root.join(consts::IMAGE_MANIFEST_FILE), &data).await?;
            matched = true;
        }

        if matched {
            self.written.lock().insert(desc.digest.clone());
        } else {
            tracing::trace!(parent: &self.span, digest = %desc.digest, media_type = %desc.media_type, "Blob not materialized");
        }
        Ok(())
    }

    async fn commit(&self, root: &Descriptor, reference: &str) -> Result<Descriptor> {
        let missing = {
            let written = self.written.lock();
            self.targets
                .iter()
                .find(|t| !written.contains(&t.digest))
                .map(|t| t.digest.clone())
        };
        if let Some(digest) = missing {
            return Err(FreighterError::PartialTransfer {
                reference: reference.to_string(),
                digest: digest.to_string(),
                message: "never written to destination".to_string(),
            });
        }

        if self.unpack_layers {
            self.unpack().await?;
        }

        tracing::info!(
            parent: &self.span,
            reference = %reference,
            digest = %root.digest,
            files = self.targets.len(),
            "Materialized content"
        );
        Ok(root.clone())
    }
}
