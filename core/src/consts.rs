//! Media types, annotation keys and defaults shared across Freighter.

// Container media types
pub const OCI_MANIFEST_SCHEMA1: &str = "application/vnd.oci.image.manifest.v1+json";
pub const DOCKER_MANIFEST_SCHEMA2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST_SCHEMA2: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_IMAGE_INDEX_SCHEMA: &str = "application/vnd.oci.image.index.v1+json";
pub const DOCKER_CONFIG_JSON: &str = "application/vnd.docker.container.image.v1+json";
pub const OCI_CONFIG_JSON: &str = "application/vnd.oci.image.config.v1+json";
pub const DOCKER_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
pub const DOCKER_FOREIGN_LAYER: &str = "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip";
pub const DOCKER_UNCOMPRESSED_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar";
pub const OCI_LAYER: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
pub const OCI_UNCOMPRESSED_LAYER: &str = "application/vnd.oci.image.layer.v1.tar";
pub const OCI_ZSTD_LAYER: &str = "application/vnd.oci.image.layer.v1.tar+zstd";
pub const OCI_ARTIFACT: &str = "application/vnd.oci.empty.v1+json";

// Helm chart media types
pub const CHART_CONFIG_MEDIA_TYPE: &str = "application/vnd.cncf.helm.config.v1+json";
pub const CHART_LAYER_MEDIA_TYPE: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
pub const PROV_LAYER_MEDIA_TYPE: &str = "application/vnd.cncf.helm.chart.provenance.v1.prov";

// File media types
pub const FILE_LAYER_MEDIA_TYPE: &str = "application/vnd.content.freighter.file.layer.v1";
pub const FILE_LOCAL_CONFIG_MEDIA_TYPE: &str =
    "application/vnd.content.freighter.file.local.config.v1+json";
pub const FILE_DIRECTORY_CONFIG_MEDIA_TYPE: &str =
    "application/vnd.content.freighter.file.directory.config.v1+json";
pub const FILE_HTTP_CONFIG_MEDIA_TYPE: &str =
    "application/vnd.content.freighter.file.http.config.v1+json";

// Memory media types
pub const MEMORY_CONFIG_MEDIA_TYPE: &str =
    "application/vnd.content.freighter.memory.config.v1+json";

// Wasm media types
pub const WASM_ARTIFACT_LAYER_MEDIA_TYPE: &str = "application/vnd.wasm.content.layer.v1+wasm";
pub const WASM_CONFIG_MEDIA_TYPE: &str = "application/vnd.wasm.config.v1+json";

// Unknown media types
pub const UNKNOWN_MANIFEST: &str = "application/vnd.freighter.cattle.io.unknown.v1+json";
pub const UNKNOWN_LAYER: &str = "application/vnd.content.freighter.unknown.layer";

// Annotation keys
pub const KIND_ANNOTATION_NAME: &str = "kind";
pub const KIND_ANNOTATION_IMAGE: &str = "dev.cosignproject.cosign/image";
pub const KIND_ANNOTATION_INDEX: &str = "dev.cosignproject.cosign/imageIndex";
pub const IMAGE_ANNOTATION_KEY: &str = "freighter.dev/key";
pub const IMAGE_ANNOTATION_PLATFORM: &str = "freighter.dev/platform";
pub const IMAGE_ANNOTATION_REGISTRY: &str = "freighter.dev/registry";
pub const IMAGE_ANNOTATION_TLOG: &str = "freighter.dev/use-tlog-verify";
pub const IMAGE_ANNOTATION_CERT_IDENTITY: &str = "freighter.dev/certificate-identity";
pub const IMAGE_ANNOTATION_CERT_IDENTITY_REGEXP: &str = "freighter.dev/certificate-identity-regexp";
pub const IMAGE_ANNOTATION_CERT_OIDC_ISSUER: &str = "freighter.dev/certificate-oidc-issuer";
pub const IMAGE_ANNOTATION_CERT_OIDC_ISSUER_REGEXP: &str =
    "freighter.dev/certificate-oidc-issuer-regexp";
pub const IMAGE_ANNOTATION_CERT_GITHUB_WORKFLOW_REPOSITORY: &str =
    "freighter.dev/certificate-github-workflow-repository";

// OCI standard annotation keys
pub const ANNOTATION_REF_NAME: &str = "org.opencontainers.image.ref.name";
pub const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";
pub const ANNOTATION_CREATED: &str = "org.opencontainers.image.created";

// Content kinds
pub const IMAGES_CONTENT_KIND: &str = "Images";
pub const CHARTS_CONTENT_KIND: &str = "Charts";
pub const FILES_CONTENT_KIND: &str = "Files";
pub const DRIVER_CONTENT_KIND: &str = "Driver";
pub const IMAGE_TXTS_CONTENT_KIND: &str = "ImageTxts";
pub const CHARTS_COLLECTION_KIND: &str = "ThickCharts";
pub const WASM_CONTENT_KIND: &str = "Wasm";
pub const MEMORY_CONTENT_KIND: &str = "Memory";

// Environment variables
pub const ENV_FREIGHTER_DIR: &str = "FREIGHTER_DIR";
pub const ENV_FREIGHTER_TEMP_DIR: &str = "FREIGHTER_TEMP_DIR";
pub const ENV_FREIGHTER_STORE_DIR: &str = "FREIGHTER_STORE_DIR";
pub const ENV_FREIGHTER_IGNORE_ERRORS: &str = "FREIGHTER_IGNORE_ERRORS";

// Image files written by the image projection
pub const IMAGE_MANIFEST_FILE: &str = "manifest.json";
pub const IMAGE_CONFIG_FILE: &str = "config.json";

// Defaults
pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const DEFAULT_NAMESPACE: &str = "freighter";
pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_STORE_NAME: &str = "store";
pub const DEFAULT_FREIGHTER_DIR_NAME: &str = ".freighter";
pub const DEFAULT_FREIGHTER_TEMP_DIR_NAME: &str = "freighter";
pub const DEFAULT_FREIGHTER_ARCHIVE_NAME: &str = "haul.tar.zst";
pub const DEFAULT_RETRIES: u32 = 3;
/// Seconds between retry attempts.
pub const RETRIES_INTERVAL: u64 = 5;

/// Prefix of the verifier message emitted when online transparency-log
/// verification was requested but no log client is available.
pub const TLOG_UNAVAILABLE_MESSAGE: &str =
    "no matching signatures: rekor client not provided for online verification";
