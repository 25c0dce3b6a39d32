//! Extracted artifacts ("loot")
//!
//! A LootRecord is immutable after creation. Artifact identity is a digest
//! over kind, label, and payload; the extraction timestamp is deliberately
//! excluded so re-extracting the same secret deduplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::Target;

/// Category of an extracted artifact
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Username/password style material
    Credential,
    /// Certificate or key material
    Certificate,
    /// Browser or web session cookie
    Cookie,
    /// Recovered file contents
    File,
    /// Anything else the backend surfaced
    Secret,
}

impl ArtifactKind {
    /// Best-effort mapping from a backend-reported type label
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "credential" | "credentials" | "password" | "login" => Self::Credential,
            "certificate" | "cert" => Self::Certificate,
            "cookie" | "cookies" => Self::Cookie,
            "file" => Self::File,
            _ => Self::Secret,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Certificate => "certificate",
            Self::Cookie => "cookie",
            Self::File => "file",
            Self::Secret => "secret",
        }
    }
}

/// A single extracted secret or artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootRecord {
    /// Source target
    pub target: Target,

    /// Artifact category
    pub kind: ArtifactKind,

    /// Short human-readable label (collector name, account, resource)
    pub label: String,

    /// Structured or opaque payload fields
    pub payload: serde_json::Value,

    /// When the artifact was extracted
    pub collected_at: DateTime<Utc>,
}

impl LootRecord {
    pub fn new(target: Target, kind: ArtifactKind, label: &str, payload: serde_json::Value) -> Self {
        Self {
            target,
            kind,
            label: label.to_string(),
            payload,
            collected_at: Utc::now(),
        }
    }

    /// Artifact identity digest: SHA-256 over kind, label, and payload,
    /// hex-encoded and truncated for path use.
    ///
    /// serde_json sorts object keys, so equal payloads digest equally.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.label.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.payload.to_string().as_bytes());
        let full = hex::encode(hasher.finalize());
        full[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> Target {
        Target::parse("10.0.0.5").unwrap()
    }

    #[test]
    fn test_artifact_kind_from_label() {
        assert_eq!(ArtifactKind::from_label("Credential"), ArtifactKind::Credential);
        assert_eq!(ArtifactKind::from_label("password"), ArtifactKind::Credential);
        assert_eq!(ArtifactKind::from_label("cert"), ArtifactKind::Certificate);
        assert_eq!(ArtifactKind::from_label("cookies"), ArtifactKind::Cookie);
        assert_eq!(ArtifactKind::from_label("file"), ArtifactKind::File);
        assert_eq!(ArtifactKind::from_label("wifi-psk"), ArtifactKind::Secret);
    }

    #[test]
    fn test_artifact_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ArtifactKind::Credential).unwrap();
        assert_eq!(json, "\"credential\"");
    }

    #[test]
    fn test_digest_is_stable_across_timestamps() {
        let a = LootRecord::new(
            target(),
            ArtifactKind::Credential,
            "Chromium",
            json!({"user": "admin", "pass": "x"}),
        );
        let mut b = a.clone();
        b.collected_at = Utc::now() + chrono::Duration::seconds(60);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_differs_by_payload() {
        let a = LootRecord::new(target(), ArtifactKind::Credential, "Chromium", json!({"u": 1}));
        let b = LootRecord::new(target(), ArtifactKind::Credential, "Chromium", json!({"u": 2}));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_differs_by_kind() {
        let a = LootRecord::new(target(), ArtifactKind::Credential, "x", json!({}));
        let b = LootRecord::new(target(), ArtifactKind::Cookie, "x", json!({}));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_is_path_sized_hex() {
        let record = LootRecord::new(target(), ArtifactKind::Secret, "x", json!({"v": true}));
        let digest = record.digest();
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let record = LootRecord::new(
            target(),
            ArtifactKind::Certificate,
            "machine-cert",
            json!({"subject": "CN=DC01"}),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: LootRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
