//! Signature verification.
//!
//! The cryptography lives behind [`SignatureVerifier`]; this module decides
//! what to ask for and wraps the call in retry.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use freighter_core::consts;
use freighter_core::error::Result;
use tokio_util::sync::CancellationToken;

use crate::retry::Retry;

/// Certificate constraints for keyless verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeylessIdentity {
    pub identity: Option<String>,
    pub identity_regexp: Option<String>,
    pub oidc_issuer: Option<String>,
    pub oidc_issuer_regexp: Option<String>,
    pub github_workflow_repository: Option<String>,
}

impl KeylessIdentity {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// How a signature is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationMethod {
    Key(PathBuf),
    Keyless(KeylessIdentity),
}

/// A single request handed to the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub method: VerificationMethod,
    /// Skip the transparency log lookup
    pub ignore_tlog: bool,
}

/// Verification inputs, usually read from manifest annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    pub key: Option<PathBuf>,
    pub keyless: KeylessIdentity,
    pub use_tlog: bool,
}

impl VerifyOptions {
    /// Read the `freighter.dev/*` verification annotations.
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| {
            annotations
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
        };
        Self {
            key: get(consts::IMAGE_ANNOTATION_KEY).map(PathBuf::from),
            keyless: KeylessIdentity {
                identity: get(consts::IMAGE_ANNOTATION_CERT_IDENTITY),
                identity_regexp: get(consts::IMAGE_ANNOTATION_CERT_IDENTITY_REGEXP),
                oidc_issuer: get(consts::IMAGE_ANNOTATION_CERT_OIDC_ISSUER),
                oidc_issuer_regexp: get(consts::IMAGE_ANNOTATION_CERT_OIDC_ISSUER_REGEXP),
                github_workflow_repository: get(
                    consts::IMAGE_ANNOTATION_CERT_GITHUB_WORKFLOW_REPOSITORY,
                ),
            },
            use_tlog: get(consts::IMAGE_ANNOTATION_TLOG).as_deref() == Some("true"),
        }
    }

    /// The request to make, or `None` when nothing asks for verification.
    ///
    /// A key wins over keyless constraints. Key verification skips the
    /// transparency log unless asked to use it; keyless always uses it.
    pub fn request(&self) -> Option<VerificationRequest> {
        if let Some(key) = &self.key {
            return Some(VerificationRequest {
                method: VerificationMethod::Key(key.clone()),
                ignore_tlog: !self.use_tlog,
            });
        }
        if !self.keyless.is_empty() {
            return Some(VerificationRequest {
                method: VerificationMethod::Keyless(self.keyless.clone()),
                ignore_tlog: false,
            });
        }
        None
    }
}

/// Opaque signature checking service.
///
/// Implementations report a missing transparency-log client as
/// `TransparencyLogUnavailable` (or an error whose message carries the
/// verifier's rekor message) so retries are logged accordingly.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, reference: &str, request: &VerificationRequest) -> Result<()>;
}

/// Verify `reference` per `options`, retrying per `retry`.
///
/// Returns `false` without calling the verifier when `options` ask for no
/// verification.
pub async fn verify_signature<V>(
    cancel: &CancellationToken,
    verifier: &V,
    reference: &str,
    options: &VerifyOptions,
    retry: &Retry,
) -> Result<bool>
where
    V: SignatureVerifier + ?Sized,
{
    let Some(request) = options.request() else {
        tracing::debug!(reference = %reference, "No signature verification requested");
        return Ok(false);
    };

    retry
        .run(cancel, || verifier.verify(reference, &request))
        .await?;

    tracing::info!(
        reference = %reference,
        keyless = matches!(request.method, VerificationMethod::Keyless(_)),
        tlog = !request.ignore_tlog,
        "Signature verified"
    );
    Ok(true)
}
