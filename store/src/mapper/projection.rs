//! Per-kind placement rules: which blob lands at which relative path.

use std::path::{Path, PathBuf};

use freighter_core::consts;
use freighter_core::error::Result;

use super::kind::{ContentKind, LayerEncoding};
use crate::fs::safe_join;
use crate::oci::descriptor::{Descriptor, Manifest};
use crate::oci::digest::Digest;

/// Target representation a manifest is projected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Image to filesystem: manifest, config and layer archives.
    Image,
    /// One file per layer (Files, Driver, ImageTxts, Memory).
    Files,
    /// Chart archive plus provenance (Charts, ThickCharts).
    Chart,
    /// Wasm module.
    Wasm,
    /// Every layer as-is, for kinds without a dedicated projection.
    Passthrough,
}

impl Projection {
    /// Projection for `kind`; `None` when the kind has no dedicated one.
    pub fn for_kind(kind: ContentKind) -> Option<Self> {
        match kind {
            ContentKind::Images => Some(Self::Image),
            ContentKind::Files
            | ContentKind::Driver
            | ContentKind::ImageTxts
            | ContentKind::Memory => Some(Self::Files),
            ContentKind::Charts | ContentKind::ThickCharts => Some(Self::Chart),
            ContentKind::Wasm => Some(Self::Wasm),
            ContentKind::Unknown => None,
        }
    }
}

/// A blob and the file it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub digest: Digest,
    pub path: PathBuf,
}

/// Placement of every config and layer blob of `manifest` under `root`.
/// Names come from descriptors, so every one is checked with [`safe_join`].
pub(crate) fn plan(projection: Projection, manifest: &Manifest, root: &Path) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    if projection == Projection::Image {
        targets.push(Target {
            digest: manifest.config.digest.clone(),
            path: root.join(consts::IMAGE_CONFIG_FILE),
        });
    }
    for layer in &manifest.layers {
        let name = layer_name(projection, layer);
        targets.push(Target {
            digest: layer.digest.clone(),
            path: safe_join(root, &name)?,
        });
    }
    Ok(targets)
}

fn layer_name(projection: Projection, layer: &Descriptor) -> String {
    let hex = layer.digest.hex();
    match projection {
        Projection::Image => format!(
            "{}{}",
            hex,
            LayerEncoding::from_media_type(&layer.media_type).extension()
        ),
        Projection::Files | Projection::Passthrough => title_or(layer, hex),
        Projection::Chart => match layer.media_type.as_str() {
            consts::CHART_LAYER_MEDIA_TYPE => title_or(layer, "chart.tgz"),
            consts::PROV_LAYER_MEDIA_TYPE => title_or(layer, "chart.prov"),
            _ => title_or(layer, hex),
        },
        Projection::Wasm => match layer.media_type.as_str() {
            consts::WASM_ARTIFACT_LAYER_MEDIA_TYPE => title_or(layer, "module.wasm"),
            _ => title_or(layer, hex),
        },
    }
}

fn title_or(layer: &Descriptor, fallback: &str) -> String {
    layer
        .title()
        .filter(|t| !t.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(media_type: &str, data: &[u8], title: Option<&str>) -> Descriptor {
        let desc = Descriptor::for_bytes(media_type, data);
        match title {
            Some(t) => desc.with_annotation(consts::ANNOTATION_TITLE, t),
            None => desc,
        }
    }

    fn config(media_type: &str) -> Descriptor {
        Descriptor::for_bytes(media_type, b"{}")
    }

    #[test]
    fn test_for_kind_is_closed() {
        assert_eq!(Projection::for_kind(ContentKind::Driver), Some(Projection::Files));
        assert_eq!(Projection::for_kind(ContentKind::ThickCharts), Some(Projection::Chart));
        assert_eq!(Projection::for_kind(ContentKind::Unknown), None);
    }

    #[test]
    fn test_image_plan_names() {
        let gz = layer(consts::OCI_LAYER, b"gz", None);
        let plain = layer(consts::OCI_UNCOMPRESSED_LAYER, b"plain", None);
        let manifest = Manifest::new(config(consts::OCI_CONFIG_JSON), vec![gz.clone(), plain.clone()]);

        let targets = plan(Projection::Image, &manifest, Path::new("/out")).unwrap();
        let paths: Vec<_> = targets.iter().map(|t| t.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/out/config.json"),
                PathBuf::from(format!("/out/{}.tar.gz", gz.digest.hex())),
                PathBuf::from(format!("/out/{}.tar", plain.digest.hex())),
            ]
        );
    }

    #[test]
    fn test_files_plan_title_and_fallback() {
        let titled = layer(consts::FILE_LAYER_MEDIA_TYPE, b"a", Some("docs/a.txt"));
        let untitled = layer(consts::FILE_LAYER_MEDIA_TYPE, b"b", None);
        let manifest = Manifest::new(
            config(consts::FILE_LOCAL_CONFIG_MEDIA_TYPE),
            vec![titled, untitled.clone()],
        );

        let targets = plan(Projection::Files, &manifest, Path::new("/out")).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].path, PathBuf::from("/out/docs/a.txt"));
        assert_eq!(
            targets[1].path,
            PathBuf::from(format!("/out/{}", untitled.digest.hex()))
        );
    }

    #[test]
    fn test_chart_and_wasm_defaults() {
        let chart = layer(consts::CHART_LAYER_MEDIA_TYPE, b"chart", None);
        let prov = layer(consts::PROV_LAYER_MEDIA_TYPE, b"prov", None);
        let manifest = Manifest::new(config(consts::CHART_CONFIG_MEDIA_TYPE), vec![chart, prov]);
        let targets = plan(Projection::Chart, &manifest, Path::new("/c")).unwrap();
        assert_eq!(targets[0].path, PathBuf::from("/c/chart.tgz"));
        assert_eq!(targets[1].path, PathBuf::from("/c/chart.prov"));

        let module = layer(consts::WASM_ARTIFACT_LAYER_MEDIA_TYPE, b"\0asm", None);
        let manifest = Manifest::new(config(consts::WASM_CONFIG_MEDIA_TYPE), vec![module]);
        let targets = plan(Projection::Wasm, &manifest, Path::new("/w")).unwrap();
        assert_eq!(targets[0].path, PathBuf::from("/w/module.wasm"));
    }

    #[test]
    fn test_traversal_title_rejected() {
        let evil = layer(consts::FILE_LAYER_MEDIA_TYPE, b"x", Some("../../etc/passwd"));
        let manifest = Manifest::new(config(consts::FILE_LOCAL_CONFIG_MEDIA_TYPE), vec![evil]);
        let err = plan(Projection::Files, &manifest, Path::new("/out")).unwrap_err();
        assert!(matches!(
            err,
            freighter_core::error::FreighterError::InvalidPath(_)
        ));
    }
}
