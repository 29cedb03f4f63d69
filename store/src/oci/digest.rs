//! Content digests.
//!
//! A digest is `<algorithm>:<hex>`. Only sha256 is produced; other
//! registered algorithms are accepted when parsing so that foreign
//! descriptors survive a round trip through the store.

use std::fmt;
use std::str::FromStr;

use freighter_core::error::{FreighterError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

/// Algorithm used for every digest the store computes.
pub const SHA256: &str = "sha256";

/// A validated content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Hash `data` with sha256.
    pub fn sha256(data: &[u8]) -> Self {
        Self {
            algorithm: SHA256.to_string(),
            hex: hex::encode(Sha256::digest(data)),
        }
    }

    /// Parse and validate a `<algorithm>:<hex>` string.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| FreighterError::invalid_reference(s, reason);

        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| invalid("digest must have the form algorithm:hex"))?;

        // Components of [a-z0-9]+ joined by single separators.
        if !algorithm.split(['+', '.', '_', '-']).all(|component| {
            !component.is_empty()
                && component
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }) {
            return Err(invalid("malformed digest algorithm"));
        }
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
            return Err(invalid("digest must be lowercase hex"));
        }
        if algorithm == SHA256 && hex.len() != 64 {
            return Err(invalid("sha256 digest must be 64 hex characters"));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Recompute the digest of `data` with this digest's algorithm and
    /// compare.
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        if self.algorithm != SHA256 {
            return Err(FreighterError::Other(format!(
                "unsupported digest algorithm: {}",
                self.algorithm
            )));
        }
        let actual = Self::sha256(data);
        if &actual != self {
            return Err(FreighterError::DigestMismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = FreighterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_sha256_known_value() {
        let d = Digest::sha256(b"hello");
        assert_eq!(d.algorithm(), "sha256");
        assert_eq!(d.hex(), HELLO);
        assert_eq!(d.to_string(), format!("sha256:{HELLO}"));
    }

    #[test]
    fn test_parse_valid() {
        let d = Digest::parse(&format!("sha256:{HELLO}")).unwrap();
        assert_eq!(d, Digest::sha256(b"hello"));
    }

    #[test]
    fn test_parse_rejects_short_sha256() {
        assert!(Digest::parse("sha256:abc123").is_err());
    }

    #[test]
    fn test_parse_rejects_uppercase_and_missing_colon() {
        assert!(Digest::parse(&format!("sha256:{}", HELLO.to_uppercase())).is_err());
        assert!(Digest::parse(HELLO).is_err());
        assert!(Digest::parse(":abc").is_err());
    }

    #[test]
    fn test_parse_algorithm_grammar() {
        for algorithm in [".", "..", "-sha", "sha256+", "sha..256", "sha/256"] {
            assert!(
                Digest::parse(&format!("{algorithm}:{HELLO}")).is_err(),
                "{algorithm}"
            );
        }
        let d = Digest::parse(&format!("multihash+base58:{HELLO}")).unwrap();
        assert_eq!(d.algorithm(), "multihash+base58");
    }

    #[test]
    fn test_descriptor_with_traversal_digest_is_rejected() {
        let json = format!(r#""..:{HELLO}""#);
        assert!(serde_json::from_str::<Digest>(&json).is_err());
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let d = Digest::sha256(b"hello");
        assert!(d.verify(b"hello").is_ok());
        let err = d.verify(b"world").unwrap_err();
        assert!(matches!(err, FreighterError::DigestMismatch { .. }));
    }

    #[test]
    fn test_serde_as_string() {
        let d = Digest::sha256(b"hello");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"sha256:{HELLO}\""));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert!(serde_json::from_str::<Digest>("\"nope\"").is_err());
    }
}
