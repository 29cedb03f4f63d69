//! Save remote artifacts into the store.

use std::sync::Arc;

use freighter_core::error::Result;
use tokio_util::sync::CancellationToken;

use crate::copy::{CopyOptions, Source};
use crate::layout::Layout;
use crate::oci::descriptor::Descriptor;
use crate::oci::reference::Reference;
use crate::oci::registry::{RegistryAuth, RegistryClient};
use crate::retry::Retry;

/// Pull `reference` from its registry into `layout`, retrying per `retry`.
///
/// Content is stored under the fully qualified reference. Digest references
/// already in the store are not fetched again.
pub async fn save_artifact(
    cancel: &CancellationToken,
    layout: &Layout,
    reference: &str,
    auth: RegistryAuth,
    retry: &Retry,
    options: &CopyOptions,
) -> Result<Descriptor> {
    let parsed = Reference::parse(reference)?;
    let client = Arc::new(RegistryClient::new(parsed.registry.clone(), auth));
    let span = tracing::info_span!(
        "registry",
        registry = %parsed.registry,
        repository = %parsed.repository
    );
    let remote = client.repository(parsed.repository.clone(), span);
    save_from(cancel, layout, &remote, &parsed, retry, options).await
}

/// Copy `reference` from `source` into `layout`.
///
/// Transient failures are retried; a corrupt or unparseable remote artifact
/// fails on the first attempt.
pub async fn save_from<S>(
    cancel: &CancellationToken,
    layout: &Layout,
    source: &S,
    reference: &Reference,
    retry: &Retry,
    options: &CopyOptions,
) -> Result<Descriptor>
where
    S: Source + ?Sized,
{
    let full_ref = reference.full_reference();

    if reference.digest.is_some() {
        if let Ok(stored) = layout.resolve(&full_ref).await {
            tracing::info!(reference = %full_ref, digest = %stored.digest, "Using stored content");
            return Ok(stored);
        }
    }

    tracing::info!(reference = %full_ref, "Saving artifact");
    let desc = retry
        .run_retryable(cancel, || {
            crate::copy::copy(cancel, source, &full_ref, layout, &full_ref, options)
        })
        .await?;

    tracing::info!(
        reference = %full_ref,
        digest = %desc.digest,
        media_type = %desc.media_type,
        "Saved artifact"
    );
    Ok(desc)
}
