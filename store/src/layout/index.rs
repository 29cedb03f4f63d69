//! Reference index persistence (`index.json`).
//!
//! The index is an OCI image index whose entries carry
//! `org.opencontainers.image.ref.name`. It is always replaced wholesale with
//! an atomic rename, so a reader in any process sees either the previous or
//! the next complete document.

use std::path::{Path, PathBuf};

use freighter_core::consts;
use freighter_core::error::{FreighterError, Result};

use crate::fs::write_atomic;
use crate::oci::descriptor::{Descriptor, ImageIndex};

pub(crate) const INDEX_FILE: &str = "index.json";

pub(crate) fn index_path(root: &Path) -> PathBuf {
    root.join(INDEX_FILE)
}

/// Load the index; a missing file is an empty index.
pub(crate) async fn load(root: &Path) -> Result<ImageIndex> {
    let path = index_path(root);
    match tokio::fs::read(&path).await {
        Ok(data) => ImageIndex::from_slice(&data).map_err(|e| {
            FreighterError::SerializationError(format!(
                "Failed to parse store index {}: {}",
                path.display(),
                e
            ))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ImageIndex::default()),
        Err(e) => Err(FreighterError::IoError(e)),
    }
}

/// Persist the index, entries sorted by reference.
pub(crate) async fn save(root: &Path, index: &mut ImageIndex) -> Result<()> {
    index
        .manifests
        .sort_by(|a, b| entry_name(a).cmp(&entry_name(b)));
    let data = serde_json::to_vec_pretty(index)?;
    write_atomic(&index_path(root), &data).await
}

/// Reference an entry is filed under. Foreign entries without a name are
/// listed under their digest.
pub(crate) fn entry_name(desc: &Descriptor) -> String {
    desc.ref_name()
        .map(str::to_string)
        .unwrap_or_else(|| desc.digest.to_string())
}

/// Insert or replace the entry for `reference`. Returns the stored entry.
pub(crate) fn upsert(index: &mut ImageIndex, desc: &Descriptor, reference: &str) -> Descriptor {
    let entry = desc
        .clone()
        .with_annotation(consts::ANNOTATION_REF_NAME, reference);
    index.manifests.retain(|d| entry_name(d) != reference);
    index.manifests.push(entry.clone());
    entry
}

pub(crate) fn remove(index: &mut ImageIndex, reference: &str) -> Option<Descriptor> {
    let pos = index
        .manifests
        .iter()
        .position(|d| entry_name(d) == reference)?;
    Some(index.manifests.remove(pos))
}

pub(crate) fn find<'a>(index: &'a ImageIndex, reference: &str) -> Option<&'a Descriptor> {
    index.manifests.iter().find(|d| entry_name(d) == reference)
}
