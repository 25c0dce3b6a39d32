//! Normalized extraction targets
//!
//! A Target's identity is its normalized address string: IP literals are
//! canonicalized through their parsed form, hostnames are lowercased.
//! Immutable once resolved.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestrError, Result};

/// An extraction destination, identified by its normalized address string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Normalize a single host token into a Target
    ///
    /// Accepts IPv4/IPv6 literals (canonicalized) and hostnames (lowercased).
    /// Fails with `InvalidTargetSpec` for empty tokens or hostnames with
    /// characters outside `[A-Za-z0-9.-_]`.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(HarvestrError::InvalidTargetSpec("empty target token".to_string()));
        }

        if let Ok(ip) = token.parse::<IpAddr>() {
            return Ok(Self(ip.to_string()));
        }

        let valid = token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'));
        if !valid {
            return Err(HarvestrError::InvalidTargetSpec(format!(
                "bad target token '{}'",
                token
            )));
        }

        Ok(Self(token.to_ascii_lowercase()))
    }

    /// Build a Target from an already-canonical IP address
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }

    /// The normalized address string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form of the identity, used for store paths
    ///
    /// Replaces path-hostile characters (IPv6 colons) with underscores.
    pub fn fs_key(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let t = Target::parse("10.0.0.5").unwrap();
        assert_eq!(t.as_str(), "10.0.0.5");
    }

    #[test]
    fn test_parse_ipv6_canonicalizes() {
        let t = Target::parse("FE80:0000:0000:0000:0000:0000:0000:0001").unwrap();
        assert_eq!(t.as_str(), "fe80::1");
    }

    #[test]
    fn test_parse_hostname_lowercases() {
        let t = Target::parse("DC01.Corp.Local").unwrap();
        assert_eq!(t.as_str(), "dc01.corp.local");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let t = Target::parse("  host01  ").unwrap();
        assert_eq!(t.as_str(), "host01");
    }

    #[test]
    fn test_parse_rejects_empty() {
        let err = Target::parse("   ").unwrap_err();
        assert!(err.to_string().contains("empty target token"));
    }

    #[test]
    fn test_parse_rejects_bad_characters() {
        let err = Target::parse("host/with/slashes").unwrap_err();
        assert!(err.to_string().contains("bad target token"));
    }

    #[test]
    fn test_identity_equality_after_normalization() {
        let a = Target::parse("DC01").unwrap();
        let b = Target::parse("dc01").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fs_key_replaces_colons() {
        let t = Target::parse("fe80::1").unwrap();
        assert_eq!(t.fs_key(), "fe80__1");
    }

    #[test]
    fn test_fs_key_plain_ipv4_unchanged() {
        let t = Target::parse("10.0.0.5").unwrap();
        assert_eq!(t.fs_key(), "10.0.0.5");
    }

    #[test]
    fn test_serde_transparent() {
        let t = Target::parse("10.0.0.5").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"10.0.0.5\"");
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
