//! Freighter Store - content-addressable artifact store.
//!
//! An OCI-layout store for container images, charts, files and wasm modules,
//! with a copy engine that only commits references once all content is
//! durable, a kind-driven mapper that projects artifacts onto the
//! filesystem, and a retry orchestrator for flaky remote operations.

#![allow(clippy::result_large_err)]

pub mod copy;
pub mod fs;
pub mod layout;
pub mod mapper;
pub mod oci;
pub mod retry;
pub mod workflow;

// Re-export common types
pub use copy::{copy, BlobReader, CopyOptions, Sink, Source};
pub use layout::{GcReport, Layout};
pub use mapper::{from_manifest, ContentKind, LayerEncoding, MappedSink, MapperOptions, Projection};
pub use oci::{Descriptor, Digest, ImageIndex, Manifest, Platform, Reference};
pub use oci::{RegistryAuth, RegistryClient, RegistryRepository};
pub use retry::{FailureClass, Retry, RetryPolicy, RetryState};

/// Freighter Store version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
