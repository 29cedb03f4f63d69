//! Artifact reference parsing.
//!
//! Parses references like `registry.example.com/ns/repo:v1.2.3` into structured components.

use freighter_core::consts::{DEFAULT_NAMESPACE, DEFAULT_REGISTRY, DEFAULT_TAG};
use freighter_core::error::{FreighterError, Result};

use super::digest::Digest;

/// Maximum tag length accepted by OCI distribution.
const MAX_TAG_LEN: usize = 128;

/// Parsed artifact reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "ns/repo")
    pub repository: String,
    /// Tag (e.g., "latest", "v1.2.3")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl Reference {
    /// Parse a reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx:latest
    /// - `nginx:1.25` → docker.io/library/nginx:1.25
    /// - `myuser/myimage` → docker.io/myuser/myimage:latest
    /// - `ghcr.io/org/image:tag` → ghcr.io/org/image:tag
    /// - `ghcr.io/org/image@sha256:abc...` → ghcr.io/org/image@sha256:abc...
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(FreighterError::invalid_reference(reference, "empty reference"));
        }
        if reference.contains("://") {
            return Err(FreighterError::invalid_reference(
                reference,
                "is a URL, not a reference",
            ));
        }
        if reference.matches('@').count() > 1 {
            return Err(FreighterError::invalid_reference(
                reference,
                "multiple digest markers",
            ));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = match reference.split_once('@') {
            Some((name_tag, digest_part)) => {
                let digest = Digest::parse(digest_part).map_err(|_| {
                    FreighterError::invalid_reference(
                        reference,
                        "invalid digest format: expected algorithm:hex",
                    )
                })?;
                (name_tag, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // Split tag (: separator, but only after the last /)
        let (name, tag) = match name_tag.rfind('/') {
            Some(slash_pos) => {
                let after_slash = &name_tag[slash_pos + 1..];
                match after_slash.rfind(':') {
                    Some(colon_pos) => (
                        &name_tag[..slash_pos + 1 + colon_pos],
                        Some(&after_slash[colon_pos + 1..]),
                    ),
                    None => (name_tag, None),
                }
            }
            None => match name_tag.rfind(':') {
                Some(colon_pos) => (&name_tag[..colon_pos], Some(&name_tag[colon_pos + 1..])),
                None => (name_tag, None),
            },
        };

        if let Some(tag) = tag {
            validate_tag(reference, tag)?;
        }

        // Determine registry and repository
        let (registry, repository) = Self::split_registry_repository(reference, name)?;

        // Apply default tag if no tag and no digest
        let tag = match (tag, &digest) {
            (Some(tag), _) => Some(tag.to_string()),
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (None, Some(_)) => None,
        };

        Ok(Reference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Reference for locally added content, namespaced under `freighter/`.
    pub fn artifact(name: &str) -> Result<Self> {
        let name = name.trim().to_ascii_lowercase();
        let repository: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        validate_component(&name, repository.trim_matches(|c: char| !c.is_ascii_alphanumeric()))?;

        Ok(Reference {
            registry: DEFAULT_REGISTRY.to_string(),
            repository: format!(
                "{}/{}",
                DEFAULT_NAMESPACE,
                repository.trim_matches(|c: char| !c.is_ascii_alphanumeric())
            ),
            tag: Some(DEFAULT_TAG.to_string()),
            digest: None,
        })
    }

    /// Split a name into registry and repository components.
    fn split_registry_repository(reference: &str, name: &str) -> Result<(String, String)> {
        // Check if the first component looks like a registry hostname
        // (contains a dot or colon, or is "localhost")
        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                validate_registry(reference, first)?;
                (first.to_string(), rest.to_string())
            }
            _ if name.contains('/') => (DEFAULT_REGISTRY.to_string(), name.to_string()),
            // Single name like "nginx" → "library/nginx" for Docker Hub
            _ => (DEFAULT_REGISTRY.to_string(), format!("library/{}", name)),
        };

        if repository.is_empty() {
            return Err(FreighterError::invalid_reference(reference, "empty repository"));
        }
        for component in repository.split('/') {
            validate_component(reference, component)?;
        }

        Ok((registry, repository))
    }

    /// Repository path without the registry.
    pub fn repository_str(&self) -> &str {
        &self.repository
    }

    /// Digest when present, otherwise the tag.
    pub fn identifier(&self) -> &str {
        self.digest
            .as_deref()
            .or(self.tag.as_deref())
            .unwrap_or(DEFAULT_TAG)
    }

    /// `registry/repository`, without identifier.
    pub fn context(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Whether a stored reference names this repository and identifier.
    ///
    /// The registry is ignored so that `ns/repo:v1` finds content saved from
    /// any registry. Repository and identifier must match exactly.
    pub fn matches(&self, stored: &str) -> bool {
        let Ok(stored) = Reference::parse(stored) else {
            return false;
        };
        if stored.repository != self.repository {
            return false;
        }
        match &self.digest {
            Some(digest) => stored.digest.as_deref() == Some(digest.as_str()),
            None => stored.tag.as_deref() == Some(self.identifier()),
        }
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = self.context();
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl std::str::FromStr for Reference {
    type Err = FreighterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn validate_tag(reference: &str, tag: &str) -> Result<()> {
    let mut chars = tag.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphanumeric() || first == '_')
                && tag.len() <= MAX_TAG_LEN
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
        }
        None => false,
    };
    if !valid {
        return Err(FreighterError::invalid_reference(
            reference,
            format!("malformed tag '{}'", tag),
        ));
    }
    Ok(())
}

fn validate_registry(reference: &str, registry: &str) -> Result<()> {
    let valid = !registry.is_empty()
        && registry
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".-:[]".contains(c));
    if !valid {
        return Err(FreighterError::invalid_reference(
            reference,
            format!("malformed registry host '{}'", registry),
        ));
    }
    Ok(())
}

fn validate_component(reference: &str, component: &str) -> Result<()> {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let valid = component.starts_with(alnum)
        && component.ends_with(alnum)
        && component
            .chars()
            .all(|c| alnum(c) || c == '.' || c == '_' || c == '-')
        && !component.contains("..");
    if !valid {
        return Err(FreighterError::invalid_reference(
            reference,
            format!("malformed repository component '{}'", component),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";

    #[test]
    fn test_parse_registry_repository_tag() {
        let r = Reference::parse("registry.example.com/ns/repo:v1.2.3").unwrap();
        assert_eq!(r.registry, "registry.example.com");
        assert_eq!(r.repository_str(), "ns/repo");
        assert_eq!(r.identifier(), "v1.2.3");
    }

    #[test]
    fn test_parse_simple_name() {
        let r = Reference::parse("nginx").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, Some("latest".to_string()));
        assert_eq!(r.digest, None);
    }

    #[test]
    fn test_parse_user_repo_with_tag() {
        let r = Reference::parse("myuser/myimage:v1.0").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "myuser/myimage");
        assert_eq!(r.tag, Some("v1.0".to_string()));
    }

    #[test]
    fn test_parse_digest_only() {
        let r = Reference::parse(&format!("repo@{DIGEST}")).unwrap();
        assert_eq!(r.identifier(), DIGEST);
        assert_eq!(r.tag, None);
        assert_eq!(r.repository, "library/repo");
    }

    #[test]
    fn test_parse_tag_and_digest_prefers_digest() {
        let r = Reference::parse(&format!("ghcr.io/org/app:v1@{DIGEST}")).unwrap();
        assert_eq!(r.tag.as_deref(), Some("v1"));
        assert_eq!(r.identifier(), DIGEST);
        assert_eq!(r.full_reference(), format!("ghcr.io/org/app:v1@{DIGEST}"));
    }

    #[test]
    fn test_parse_registry_with_port() {
        let r = Reference::parse("myregistry.io:5000/myimage:v1").unwrap();
        assert_eq!(r.registry, "myregistry.io:5000");
        assert_eq!(r.repository, "myimage");
        assert_eq!(r.tag, Some("v1".to_string()));
    }

    #[test]
    fn test_parse_localhost_registry() {
        let r = Reference::parse("localhost/myimage:test").unwrap();
        assert_eq!(r.registry, "localhost");
        assert_eq!(r.repository, "myimage");
    }

    #[test]
    fn test_parse_empty_reference() {
        let err = Reference::parse("").unwrap_err();
        assert!(matches!(err, FreighterError::InvalidReference { .. }));
        assert!(Reference::parse("   ").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(Reference::parse("nginx@invaliddigest").is_err());
        assert!(Reference::parse(&format!("a@{DIGEST}@{DIGEST}")).is_err());
        assert!(Reference::parse("Upper/Case").is_err());
        assert!(Reference::parse("ghcr.io/").is_err());
        assert!(Reference::parse("repo:bad tag").is_err());
        assert!(Reference::parse("repo:").is_err());
        assert!(Reference::parse("https://example.com/file.txt").is_err());
        assert!(Reference::parse("ns//repo").is_err());
    }

    #[test]
    fn test_context_and_display() {
        let r = Reference::parse("nginx:1.25").unwrap();
        assert_eq!(r.context(), "docker.io/library/nginx");
        assert_eq!(format!("{}", r), "docker.io/library/nginx:1.25");
    }

    #[test]
    fn test_matches_stored_reference() {
        let r = Reference::parse("ns/repo:v1").unwrap();
        assert!(r.matches("docker.io/ns/repo:v1"));
        assert!(r.matches("registry.example.com/ns/repo:v1"));
        assert!(!r.matches("docker.io/ns/repo:v2"));
        assert!(!r.matches("docker.io/other/repo:v1"));
        assert!(!r.matches("docker.io/ns/repo:v10"));
        assert!(!r.matches("docker.io/otherns/repo:v1"));
        assert!(!r.matches("docker.io/ns/repo-extra:v1"));
        assert!(!r.matches("not a reference"));
    }

    #[test]
    fn test_matches_by_digest() {
        let digest = format!("sha256:{}", "a".repeat(64));
        let r = Reference::parse(&format!("ns/repo@{digest}")).unwrap();
        assert!(r.matches(&format!("ghcr.io/ns/repo@{digest}")));
        assert!(r.matches(&format!("ghcr.io/ns/repo:v1@{digest}")));
        assert!(!r.matches("ghcr.io/ns/repo:v1"));
        assert!(!r.matches(&format!("ghcr.io/ns/repo@sha256:{}", "b".repeat(64))));
    }

    #[test]
    fn test_artifact_reference() {
        let r = Reference::artifact("My File.txt").unwrap();
        assert_eq!(r.repository, "freighter/my-file.txt");
        assert_eq!(r.identifier(), "latest");
        assert!(Reference::artifact("   ").is_err());
    }

    #[test]
    fn test_deep_repository_path() {
        let r = Reference::parse("ghcr.io/org/sub/image:v1").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.repository, "org/sub/image");
    }
}
