//! Remote registry adapter.
//!
//! Uses the `oci-distribution` crate to talk to container registries (Docker
//! Hub, GHCR, private registries). A [`RegistryRepository`] is bound to one
//! repository and can be used as a copy source or sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use freighter_core::consts;
use freighter_core::error::{FreighterError, Result};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::OciDistributionError;
use oci_distribution::manifest::OciDescriptor;
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, RegistryOperation};
use parking_lot::Mutex;

use super::descriptor::{document_shape, Descriptor, DocumentShape};
use super::digest::Digest;
use super::reference::Reference;
use crate::copy::{Sink, Source};

/// Manifest media types requested when resolving a reference.
const ACCEPTED_MANIFEST_TYPES: &[&str] = &[
    consts::OCI_MANIFEST_SCHEMA1,
    consts::DOCKER_MANIFEST_SCHEMA2,
    consts::OCI_IMAGE_INDEX_SCHEMA,
    consts::DOCKER_MANIFEST_LIST_SCHEMA2,
];

/// Authentication credentials for a container registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match (lookup("REGISTRY_USERNAME"), lookup("REGISTRY_PASSWORD")) {
            (Some(username), Some(password)) => Self::basic(username, password),
            _ => Self::anonymous(),
        }
    }

    /// Explicit credentials when both are given, otherwise the environment.
    pub fn resolve(username: Option<String>, password: Option<String>) -> Self {
        match (username, password) {
            (Some(username), Some(password)) => Self::basic(username, password),
            _ => Self::from_env(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    /// Convert to oci-distribution auth type.
    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Connection to one registry host.
pub struct RegistryClient {
    registry: String,
    client: Client,
    auth: RegistryAuth,
}

impl RegistryClient {
    /// Create a client speaking HTTPS to `registry`.
    pub fn new(registry: impl Into<String>, auth: RegistryAuth) -> Self {
        Self::with_protocol(registry.into(), auth, false)
    }

    /// Create a client speaking plain HTTP to `registry`.
    pub fn insecure(registry: impl Into<String>, auth: RegistryAuth) -> Self {
        Self::with_protocol(registry.into(), auth, true)
    }

    fn with_protocol(registry: String, auth: RegistryAuth, plain_http: bool) -> Self {
        let protocol = if plain_http {
            ClientProtocol::HttpsExcept(vec![registry.clone()])
        } else {
            ClientProtocol::Https
        };
        let config = ClientConfig {
            protocol,
            ..Default::default()
        };
        Self {
            registry,
            client: Client::new(config),
            auth,
        }
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Bind to `repository` on this registry, logging under `span`.
    pub fn repository(
        self: &Arc<Self>,
        repository: impl Into<String>,
        span: tracing::Span,
    ) -> RegistryRepository {
        RegistryRepository {
            client: Arc::clone(self),
            repository: repository.into(),
            pull_authenticated: AtomicBool::new(false),
            push_authenticated: AtomicBool::new(false),
            manifests: Mutex::new(HashMap::new()),
            staged: Mutex::new(HashMap::new()),
            span,
        }
    }

    fn error(&self, message: impl Into<String>) -> FreighterError {
        FreighterError::RegistryError {
            registry: self.registry.clone(),
            message: message.into(),
        }
    }
}

/// One repository on a remote registry.
///
/// As a sink it uploads config and layer blobs as they arrive but holds
/// manifests back until commit, so the remote tag only appears once the whole
/// artifact is accepted. Manifests are uploaded as the exact bytes pushed, so
/// the remote digest equals the local one.
pub struct RegistryRepository {
    client: Arc<RegistryClient>,
    repository: String,
    pull_authenticated: AtomicBool,
    push_authenticated: AtomicBool,
    /// Manifests fetched during resolve, by digest
    manifests: Mutex<HashMap<Digest, Vec<u8>>>,
    /// Manifests and indexes awaiting commit, by digest
    staged: Mutex<HashMap<Digest, (Descriptor, Vec<u8>)>>,
    span: tracing::Span,
}

impl RegistryRepository {
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Remote reference for `reference`: only its tag or digest is used, the
    /// registry and repository are this binding's.
    pub fn target(&self, reference: &str) -> Result<oci_distribution::Reference> {
        let parsed = Reference::parse(reference)?;
        let ref_str = match (&parsed.digest, &parsed.tag) {
            (Some(digest), _) => format!("{}/{}@{}", self.client.registry, self.repository, digest),
            (None, Some(tag)) => format!("{}/{}:{}", self.client.registry, self.repository, tag),
            (None, None) => format!(
                "{}/{}:{}",
                self.client.registry,
                self.repository,
                consts::DEFAULT_TAG
            ),
        };
        self.oci_reference(&ref_str)
    }

    fn oci_reference(&self, ref_str: &str) -> Result<oci_distribution::Reference> {
        ref_str
            .parse::<oci_distribution::Reference>()
            .map_err(|e| FreighterError::invalid_reference(ref_str, e.to_string()))
    }

    fn by_digest(&self, digest: &Digest) -> Result<oci_distribution::Reference> {
        self.oci_reference(&format!(
            "{}/{}@{}",
            self.client.registry, self.repository, digest
        ))
    }

    async fn ensure_auth(
        &self,
        oci_ref: &oci_distribution::Reference,
        operation: RegistryOperation,
    ) -> Result<()> {
        let flag = match operation {
            RegistryOperation::Pull => &self.pull_authenticated,
            RegistryOperation::Push => &self.push_authenticated,
        };
        if flag.load(Ordering::Acquire) {
            return Ok(());
        }
        self.client
            .client
            .auth(oci_ref, &self.client.auth.to_oci_auth(), operation)
            .await
            .map_err(|e| self.client.error(format!("Failed to authenticate: {}", e)))?;
        flag.store(true, Ordering::Release);
        Ok(())
    }

    /// Upload manifest bytes unchanged under `oci_ref`.
    async fn put_manifest(
        &self,
        oci_ref: &oci_distribution::Reference,
        desc: &Descriptor,
        data: Vec<u8>,
    ) -> Result<String> {
        self.ensure_auth(oci_ref, RegistryOperation::Push).await?;
        let media_type = manifest_content_type(desc, &data);
        let content_type = http::HeaderValue::from_str(media_type).map_err(|e| {
            self.client
                .error(format!("Invalid manifest media type '{}': {}", media_type, e))
        })?;
        self.client
            .client
            .push_manifest_raw(oci_ref, data, content_type)
            .await
            .map_err(|e| {
                self.client
                    .error(format!("Failed to push manifest {}: {}", oci_ref, e))
            })
    }

    async fn pull_manifest(&self, oci_ref: &oci_distribution::Reference) -> Result<(Vec<u8>, String)> {
        self.client
            .client
            .pull_manifest_raw(oci_ref, &self.client.auth.to_oci_auth(), ACCEPTED_MANIFEST_TYPES)
            .await
            .map_err(|e| match e {
                OciDistributionError::ImageManifestNotFoundError(_) => {
                    FreighterError::NotFound(format!("manifest {}", oci_ref))
                }
                other => self
                    .client
                    .error(format!("Failed to pull manifest {}: {}", oci_ref, other)),
            })
    }
}

#[async_trait]
impl Source for RegistryRepository {
    async fn resolve(&self, reference: &str) -> Result<Descriptor> {
        let oci_ref = self.target(reference)?;
        let (data, digest) = self.pull_manifest(&oci_ref).await?;
        let digest = Digest::parse(&digest).unwrap_or_else(|_| Digest::sha256(&data));

        let media_type = serde_json::from_slice::<serde_json::Value>(&data)
            .ok()
            .and_then(|v| v.get("mediaType").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| {
                let untyped = Descriptor::for_bytes("", &data);
                match document_shape(&untyped, &data) {
                    DocumentShape::Index => consts::OCI_IMAGE_INDEX_SCHEMA.to_string(),
                    _ => consts::OCI_MANIFEST_SCHEMA1.to_string(),
                }
            });

        tracing::debug!(parent: &self.span, reference = %oci_ref, digest = %digest, media_type = %media_type, "Resolved remote reference");

        let desc = Descriptor {
            media_type,
            digest: digest.clone(),
            size: data.len() as u64,
            annotations: Default::default(),
            platform: None,
        };
        self.manifests.lock().insert(digest, data);
        Ok(desc)
    }

    async fn fetch(&self, desc: &Descriptor) -> Result<Vec<u8>> {
        let cached = self.manifests.lock().get(&desc.digest).cloned();
        if let Some(data) = cached {
            return Ok(data);
        }

        let oci_ref = self.by_digest(&desc.digest)?;
        if desc.is_manifest() || desc.is_index() {
            let (data, _) = self.pull_manifest(&oci_ref).await?;
            return Ok(data);
        }

        self.ensure_auth(&oci_ref, RegistryOperation::Pull).await?;
        let layer = OciDescriptor {
            media_type: desc.media_type.clone(),
            digest: desc.digest.to_string(),
            size: desc.size as i64,
            ..Default::default()
        };
        let mut data: Vec<u8> = Vec::with_capacity(desc.size as usize);
        self.client
            .client
            .pull_blob(&oci_ref, &layer, &mut data)
            .await
            .map_err(|e| {
                self.client
                    .error(format!("Failed to pull blob {}: {}", desc.digest, e))
            })?;

        tracing::debug!(parent: &self.span, digest = %desc.digest, size = data.len(), "Pulled blob");
        Ok(data)
    }
}

/// Content type for a manifest upload: its own media type, or one inferred
/// from its shape when the descriptor carries none.
fn manifest_content_type<'a>(desc: &'a Descriptor, data: &[u8]) -> &'a str {
    if !desc.media_type.is_empty() {
        return &desc.media_type;
    }
    match document_shape(desc, data) {
        DocumentShape::Index => consts::OCI_IMAGE_INDEX_SCHEMA,
        _ => consts::OCI_MANIFEST_SCHEMA1,
    }
}

#[async_trait]
impl Sink for RegistryRepository {
    async fn push(&self, desc: &Descriptor, data: Vec<u8>) -> Result<()> {
        desc.verify(&data)?;
        if document_shape(desc, &data) != DocumentShape::Blob {
            self.staged
                .lock()
                .insert(desc.digest.clone(), (desc.clone(), data));
            return Ok(());
        }

        let oci_ref = self.by_digest(&desc.digest)?;
        self.ensure_auth(&oci_ref, RegistryOperation::Push).await?;
        self.client
            .client
            .push_blob(&oci_ref, &data, &desc.digest.to_string())
            .await
            .map_err(|e| {
                self.client
                    .error(format!("Failed to push blob {}: {}", desc.digest, e))
            })?;

        tracing::debug!(parent: &self.span, digest = %desc.digest, size = desc.size, "Pushed blob");
        Ok(())
    }

    /// Upload the staged manifests, children by digest first, then tag the
    /// root.
    async fn commit(&self, root: &Descriptor, reference: &str) -> Result<Descriptor> {
        let oci_ref = self.target(reference)?;
        let mut staged = std::mem::take(&mut *self.staged.lock());

        let (_, root_bytes) =
            staged
                .remove(&root.digest)
                .ok_or_else(|| FreighterError::PartialTransfer {
                    reference: reference.to_string(),
                    digest: root.digest.to_string(),
                    message: "manifest was never pushed".to_string(),
                })?;

        // Plain manifests before nested indexes.
        let mut children: Vec<_> = staged.into_values().collect();
        children.sort_by_key(|(desc, data)| document_shape(desc, data) == DocumentShape::Index);
        for (desc, data) in children {
            let child_ref = self.by_digest(&desc.digest)?;
            self.put_manifest(&child_ref, &desc, data).await?;
        }

        let manifest_url = self.put_manifest(&oci_ref, root, root_bytes).await?;

        tracing::info!(
            parent: &self.span,
            reference = %oci_ref,
            digest = %root.digest,
            manifest_url = %manifest_url,
            "Pushed artifact"
        );
        Ok(root.clone())
    }
}
