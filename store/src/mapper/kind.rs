//! Content kind and layer encoding classification.

use freighter_core::consts;

use crate::oci::descriptor::Manifest;

/// Logical kind of a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Images,
    Charts,
    Files,
    Driver,
    ImageTxts,
    ThickCharts,
    Wasm,
    Memory,
    Unknown,
}

impl ContentKind {
    /// Kind named by a `kind` annotation value.
    pub fn from_annotation(value: &str) -> Self {
        match value {
            consts::IMAGES_CONTENT_KIND => Self::Images,
            consts::CHARTS_CONTENT_KIND => Self::Charts,
            consts::FILES_CONTENT_KIND => Self::Files,
            consts::DRIVER_CONTENT_KIND => Self::Driver,
            consts::IMAGE_TXTS_CONTENT_KIND => Self::ImageTxts,
            consts::CHARTS_COLLECTION_KIND => Self::ThickCharts,
            consts::WASM_CONTENT_KIND => Self::Wasm,
            consts::MEMORY_CONTENT_KIND => Self::Memory,
            _ => Self::Unknown,
        }
    }

    /// Kind implied by a config media type.
    pub fn from_config_media_type(media_type: &str) -> Self {
        match media_type {
            consts::DOCKER_CONFIG_JSON | consts::OCI_CONFIG_JSON => Self::Images,
            consts::CHART_CONFIG_MEDIA_TYPE => Self::Charts,
            consts::FILE_LOCAL_CONFIG_MEDIA_TYPE
            | consts::FILE_DIRECTORY_CONFIG_MEDIA_TYPE
            | consts::FILE_HTTP_CONFIG_MEDIA_TYPE => Self::Files,
            consts::MEMORY_CONFIG_MEDIA_TYPE => Self::Memory,
            consts::WASM_CONFIG_MEDIA_TYPE => Self::Wasm,
            _ => Self::Unknown,
        }
    }

    /// Classify a manifest: the `kind` annotation wins when it names a known
    /// kind, otherwise the config media type decides.
    pub fn of(manifest: &Manifest) -> Self {
        match manifest
            .annotation(consts::KIND_ANNOTATION_NAME)
            .map(Self::from_annotation)
        {
            Some(kind) if kind != Self::Unknown => kind,
            _ => Self::from_config_media_type(&manifest.config.media_type),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => consts::IMAGES_CONTENT_KIND,
            Self::Charts => consts::CHARTS_CONTENT_KIND,
            Self::Files => consts::FILES_CONTENT_KIND,
            Self::Driver => consts::DRIVER_CONTENT_KIND,
            Self::ImageTxts => consts::IMAGE_TXTS_CONTENT_KIND,
            Self::ThickCharts => consts::CHARTS_COLLECTION_KIND,
            Self::Wasm => consts::WASM_CONTENT_KIND,
            Self::Memory => consts::MEMORY_CONTENT_KIND,
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical encoding of a layer, independent of what it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerEncoding {
    Raw,
    Tar,
    TarGzip,
    TarZstd,
}

impl LayerEncoding {
    pub fn from_media_type(media_type: &str) -> Self {
        if media_type.ends_with("+zstd") || media_type.ends_with(".zstd") {
            Self::TarZstd
        } else if media_type.ends_with("tar+gzip")
            || media_type.ends_with(".tar.gzip")
            || media_type.ends_with("tar.gz")
        {
            Self::TarGzip
        } else if media_type.ends_with(".tar") {
            Self::Tar
        } else {
            Self::Raw
        }
    }

    /// File extension used when a layer is materialized as-is.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::Tar => ".tar",
            Self::TarGzip => ".tar.gz",
            Self::TarZstd => ".tar.zst",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::descriptor::Descriptor;

    fn manifest(config_media_type: &str, kind: Option<&str>) -> Manifest {
        let mut m = Manifest::new(Descriptor::for_bytes(config_media_type, b"{}"), vec![]);
        if let Some(kind) = kind {
            m.annotations
                .insert(consts::KIND_ANNOTATION_NAME.to_string(), kind.to_string());
        }
        m
    }

    #[test]
    fn test_annotation_wins() {
        let m = manifest(consts::OCI_CONFIG_JSON, Some("Charts"));
        assert_eq!(ContentKind::of(&m), ContentKind::Charts);
    }

    #[test]
    fn test_config_media_type_fallback() {
        assert_eq!(
            ContentKind::of(&manifest(consts::OCI_CONFIG_JSON, None)),
            ContentKind::Images
        );
        assert_eq!(
            ContentKind::of(&manifest(consts::FILE_LOCAL_CONFIG_MEDIA_TYPE, Some("bogus"))),
            ContentKind::Files
        );
        assert_eq!(
            ContentKind::of(&manifest("application/x-unheard-of", None)),
            ContentKind::Unknown
        );
    }

    #[test]
    fn test_every_kind_round_trips_through_annotation() {
        for kind in [
            ContentKind::Images,
            ContentKind::Charts,
            ContentKind::Files,
            ContentKind::Driver,
            ContentKind::ImageTxts,
            ContentKind::ThickCharts,
            ContentKind::Wasm,
            ContentKind::Memory,
        ] {
            assert_eq!(ContentKind::from_annotation(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_layer_encoding() {
        assert_eq!(
            LayerEncoding::from_media_type(consts::OCI_LAYER),
            LayerEncoding::TarGzip
        );
        assert_eq!(
            LayerEncoding::from_media_type(consts::DOCKER_LAYER),
            LayerEncoding::TarGzip
        );
        assert_eq!(
            LayerEncoding::from_media_type(consts::OCI_UNCOMPRESSED_LAYER),
            LayerEncoding::Tar
        );
        assert_eq!(
            LayerEncoding::from_media_type(consts::DOCKER_UNCOMPRESSED_LAYER),
            LayerEncoding::Tar
        );
        assert_eq!(
            LayerEncoding::from_media_type(consts::OCI_ZSTD_LAYER),
            LayerEncoding::TarZstd
        );
        assert_eq!(
            LayerEncoding::from_media_type(consts::FILE_LAYER_MEDIA_TYPE),
            LayerEncoding::Raw
        );
        assert_eq!(
            LayerEncoding::from_media_type(consts::CHART_LAYER_MEDIA_TYPE),
            LayerEncoding::TarGzip
        );
    }
}
