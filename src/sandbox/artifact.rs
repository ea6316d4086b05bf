//! Cache-artifact encoding for compiled units.
//!
//! The artifact identifies a compiled unit (magic, format version, engine
//! cache version, SHA-256 of the source), which is the invalidation key a
//! bytecode cache would be keyed by. It deliberately carries no compiled
//! payload and there is no decode path: rehydrating a unit from an artifact
//! is out of scope, a known limitation rather than a feature.

use sha2::{Digest, Sha256};

/// Leading bytes of every artifact.
pub const ARTIFACT_MAGIC: [u8; 4] = *b"CUAF";

/// Version of the artifact layout itself.
pub const ARTIFACT_FORMAT_VERSION: u16 = 1;

/// Total artifact size: magic + format version + engine version + hash.
pub const ARTIFACT_LEN: usize = 4 + 2 + 4 + 32;

/// SHA-256 of the source text, computed once at compile time.
pub fn source_hash(source: &str) -> [u8; 32] {
    Sha256::digest(source.as_bytes()).into()
}

/// Encode an artifact from a unit's invalidation key.
pub fn encode(engine_cache_version: u32, source_hash: &[u8; 32]) -> Vec<u8> {
    let mut artifact = Vec::with_capacity(ARTIFACT_LEN);
    artifact.extend_from_slice(&ARTIFACT_MAGIC);
    artifact.extend_from_slice(&ARTIFACT_FORMAT_VERSION.to_le_bytes());
    artifact.extend_from_slice(&engine_cache_version.to_le_bytes());
    artifact.extend_from_slice(source_hash);
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_layout() {
        let artifact = encode(3, &source_hash("1+1"));
        assert_eq!(artifact.len(), ARTIFACT_LEN);
        assert_eq!(&artifact[..4], &ARTIFACT_MAGIC);
        assert_eq!(&artifact[4..6], &ARTIFACT_FORMAT_VERSION.to_le_bytes());
        assert_eq!(&artifact[6..10], &3u32.to_le_bytes());
    }

    #[test]
    fn test_artifact_is_deterministic() {
        assert_eq!(encode(1, &source_hash("x + y")), encode(1, &source_hash("x + y")));
    }

    #[test]
    fn test_artifact_varies_with_source_and_version() {
        let base = encode(1, &source_hash("1+1"));
        assert_ne!(base, encode(1, &source_hash("1+2")));
        assert_ne!(base, encode(2, &source_hash("1+1")));
    }
}
