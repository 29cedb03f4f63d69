//! OCI descriptors, manifests and image indexes.

use std::collections::BTreeMap;

use freighter_core::consts;
use freighter_core::error::{FreighterError, Result};
use serde::{Deserialize, Serialize};

use super::digest::Digest;

/// Content-addressed pointer to a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: Digest,
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Set on image-index entries of multi-platform images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

/// Platform an image-index entry was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    /// Parse `os/arch[/variant]`, e.g. `linux/arm64/v8`.
    pub fn parse(platform: &str) -> Result<Self> {
        let parts: Vec<&str> = platform.split('/').collect();
        let invalid = || {
            FreighterError::ConfigError(format!(
                "invalid platform '{}': expected os/arch[/variant]",
                platform
            ))
        };
        match parts.as_slice() {
            [os, arch] | [os, arch, _] if os.is_empty() || arch.is_empty() => Err(invalid()),
            [os, arch] => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: None,
            }),
            [os, arch, variant] if !variant.is_empty() => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: Some(variant.to_string()),
            }),
            _ => Err(invalid()),
        }
    }

    /// Whether `self`, used as a selector, accepts `other`. A selector without
    /// a variant accepts every variant.
    pub fn selects(&self, other: &Platform) -> bool {
        self.os == other.os
            && self.architecture == other.architecture
            && (self.variant.is_none() || self.variant == other.variant)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

impl Descriptor {
    /// Describe `data` as a blob of `media_type`.
    pub fn for_bytes(media_type: impl Into<String>, data: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            digest: Digest::sha256(data),
            size: data.len() as u64,
            annotations: BTreeMap::new(),
            platform: None,
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(|s| s.as_str())
    }

    /// `org.opencontainers.image.title`, used as a file name by the mapper.
    pub fn title(&self) -> Option<&str> {
        self.annotation(consts::ANNOTATION_TITLE)
    }

    /// `org.opencontainers.image.ref.name`, set on reference-index entries.
    pub fn ref_name(&self) -> Option<&str> {
        self.annotation(consts::ANNOTATION_REF_NAME)
    }

    /// Platform of an index entry, from its `platform` field or, failing
    /// that, the `freighter.dev/platform` annotation.
    pub fn platform(&self) -> Option<Platform> {
        self.platform.clone().or_else(|| {
            self.annotation(consts::IMAGE_ANNOTATION_PLATFORM)
                .and_then(|p| Platform::parse(p).ok())
        })
    }

    pub fn is_manifest(&self) -> bool {
        is_manifest_media_type(&self.media_type)
    }

    pub fn is_index(&self) -> bool {
        is_index_media_type(&self.media_type)
    }

    /// Check that `data` is exactly the content this descriptor names.
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        if data.len() as u64 != self.size {
            return Err(FreighterError::DigestMismatch {
                expected: format!("{} ({} bytes)", self.digest, self.size),
                actual: format!("{} ({} bytes)", Digest::sha256(data), data.len()),
            });
        }
        self.digest.verify(data)
    }
}

pub fn is_manifest_media_type(media_type: &str) -> bool {
    matches!(
        media_type,
        consts::OCI_MANIFEST_SCHEMA1 | consts::DOCKER_MANIFEST_SCHEMA2 | consts::UNKNOWN_MANIFEST
    )
}

pub fn is_index_media_type(media_type: &str) -> bool {
    matches!(
        media_type,
        consts::OCI_IMAGE_INDEX_SCHEMA | consts::DOCKER_MANIFEST_LIST_SCHEMA2
    )
}

/// Image (or artifact) manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Manifest {
    /// Build an OCI manifest over `config` and `layers`.
    pub fn new(config: Descriptor, layers: Vec<Descriptor>) -> Self {
        Self {
            schema_version: 2,
            media_type: Some(consts::OCI_MANIFEST_SCHEMA1.to_string()),
            config,
            layers,
            annotations: BTreeMap::new(),
        }
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| FreighterError::SerializationError(format!("Failed to parse manifest: {}", e)))
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Media type to record for this manifest, defaulting to OCI.
    pub fn media_type(&self) -> &str {
        self.media_type
            .as_deref()
            .unwrap_or(consts::OCI_MANIFEST_SCHEMA1)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(|s| s.as_str())
    }

    /// Config first, then layers in manifest order.
    pub fn blobs(&self) -> impl Iterator<Item = &Descriptor> {
        std::iter::once(&self.config).chain(self.layers.iter())
    }
}

/// Image index: `index.json` of a layout, or a multi-platform manifest list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Default for ImageIndex {
    fn default() -> Self {
        Self {
            schema_version: 2,
            media_type: Some(consts::OCI_IMAGE_INDEX_SCHEMA.to_string()),
            manifests: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

impl ImageIndex {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| FreighterError::SerializationError(format!("Failed to parse index: {}", e)))
    }
}

/// Shape of a JSON document whose media type is unknown or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    Manifest,
    Index,
    Blob,
}

/// Decide how to treat `data` described by `desc`.
///
/// Media types win; untyped JSON is sniffed for `manifests` or `layers`.
pub fn document_shape(desc: &Descriptor, data: &[u8]) -> DocumentShape {
    if desc.is_index() {
        return DocumentShape::Index;
    }
    if desc.is_manifest() {
        return DocumentShape::Manifest;
    }
    match serde_json::from_slice::<serde_json::Value>(data) {
        Ok(serde_json::Value::Object(map)) if map.contains_key("manifests") => DocumentShape::Index,
        Ok(serde_json::Value::Object(map))
            if map.contains_key("config") && map.contains_key("layers") =>
        {
            DocumentShape::Manifest
        }
        _ => DocumentShape::Blob,
    }
}
