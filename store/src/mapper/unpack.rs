//! Layer unpacking.
//!
//! Applies tar layers onto a directory, choosing the decoder from the layer's
//! [`LayerEncoding`].

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use freighter_core::error::{FreighterError, Result};
use tar::Archive;

use super::kind::LayerEncoding;

/// Unpack the layer stored at `layer_path` into `target_dir`.
///
/// Later layers overwrite earlier ones, so callers apply them in manifest
/// order. `Raw` layers are not archives and are rejected.
pub fn unpack_layer(layer_path: &Path, encoding: LayerEncoding, target_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(target_dir).map_err(|e| {
        FreighterError::IoError(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to create target directory {}: {}",
                target_dir.display(),
                e
            ),
        ))
    })?;

    let file = File::open(layer_path).map_err(|e| {
        FreighterError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to open layer file {}: {}", layer_path.display(), e),
        ))
    })?;

    let reader: Box<dyn Read> = match encoding {
        LayerEncoding::Tar => Box::new(file),
        LayerEncoding::TarGzip => Box::new(GzDecoder::new(file)),
        LayerEncoding::TarZstd => Box::new(zstd::Decoder::new(file)?),
        LayerEncoding::Raw => {
            return Err(FreighterError::UnsupportedKind(format!(
                "layer {} is not an archive",
                layer_path.display()
            )))
        }
    };

    let mut archive = Archive::new(reader);
    archive.set_overwrite(true);
    archive.unpack(target_dir).map_err(|e| {
        FreighterError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to extract layer to {}: {}", target_dir.display(), e),
        ))
    })?;

    tracing::debug!(
        layer = %layer_path.display(),
        target = %target_dir.display(),
        ?encoding,
        "Unpacked layer"
    );
    Ok(())
}
