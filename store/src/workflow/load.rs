//! Push stored artifacts to a registry.

use std::sync::Arc;

use freighter_core::error::Result;
use tokio_util::sync::CancellationToken;

use crate::copy::{CopyOptions, Sink};
use crate::layout::Layout;
use crate::oci::descriptor::Descriptor;
use crate::oci::reference::Reference;
use crate::oci::registry::RegistryClient;

/// Push every stored reference to the registry behind `client`, keeping each
/// reference's repository and identifier.
///
/// `only` restricts the push to references containing that substring.
pub async fn load_artifacts(
    cancel: &CancellationToken,
    layout: &Layout,
    client: &Arc<RegistryClient>,
    only: Option<&str>,
    options: &CopyOptions,
) -> Result<Vec<(String, Descriptor)>> {
    load_into(cancel, layout, only, options, |reference| {
        let span = tracing::info_span!(
            "registry",
            registry = %client.registry(),
            repository = %reference.repository
        );
        Ok(client.repository(reference.repository.clone(), span))
    })
    .await
}

/// Copy every selected stored reference into the sink `sink_for` builds for
/// it. Stops at the first failure; references already copied stay copied.
pub async fn load_into<F, D>(
    cancel: &CancellationToken,
    layout: &Layout,
    only: Option<&str>,
    options: &CopyOptions,
    sink_for: F,
) -> Result<Vec<(String, Descriptor)>>
where
    F: Fn(&Reference) -> Result<D>,
    D: Sink,
{
    let mut selected = Vec::new();
    layout
        .walk(|stored, _| {
            if only.map_or(true, |filter| stored.contains(filter)) {
                selected.push(stored.to_string());
            }
            Ok(())
        })
        .await?;

    let mut loaded = Vec::with_capacity(selected.len());
    for stored in selected {
        let reference = Reference::parse(&stored)?;
        let sink = sink_for(&reference)?;
        let desc = layout
            .copy_with_options(cancel, &stored, &sink, &stored, options)
            .await?;
        tracing::info!(reference = %stored, digest = %desc.digest, "Loaded artifact");
        loaded.push((stored, desc));
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::testing::MemorySink;
    use crate::workflow::artifact::add_file;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_filters_and_pushes_each_reference() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::open(tmp.path().join("store")).await.unwrap();
        for name in ["alpha.txt", "beta.txt", "gamma.cfg"] {
            let path = tmp.path().join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            add_file(&layout, &path, None).await.unwrap();
        }

        let repositories = Mutex::new(Vec::new());
        let loaded = load_into(
            &CancellationToken::new(),
            &layout,
            Some(".txt"),
            &CopyOptions::default(),
            |reference| {
                repositories
                    .lock()
                    .unwrap()
                    .push(reference.repository.clone());
                Ok(MemorySink::default())
            },
        )
        .await
        .unwrap();

        let names: Vec<_> = loaded.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "docker.io/freighter/alpha.txt:latest",
                "docker.io/freighter/beta.txt:latest"
            ]
        );
        assert_eq!(
            *repositories.lock().unwrap(),
            vec!["freighter/alpha.txt", "freighter/beta.txt"]
        );
    }
}
