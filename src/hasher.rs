//! Content fingerprints for interaction documents using Blake3

use blake3::Hasher as Blake3Hasher;
use serde_json::Value as Json;

use crate::types::Fingerprint;

/// Hashes canonical interaction documents
///
/// A document is hashed in its compact form with sorted keys, so the
/// fingerprint does not depend on how the artifact was pretty-printed.
#[derive(Debug, Clone, Default)]
pub struct DocumentHasher {}

impl DocumentHasher {
    pub fn new() -> Self {
        Self {}
    }

    /// Fingerprint of the canonical text of `document`
    pub fn hash(&self, document: &Json) -> Fingerprint {
        self.hash_bytes(document.to_string().as_bytes())
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> Fingerprint {
        let mut hasher = Blake3Hasher::new();
        hasher.update(bytes);
        Fingerprint(*hasher.finalize().as_bytes())
    }

    /// Single fingerprint for an ordered sequence of fingerprints
    ///
    /// Used to summarize every artifact written by one session.
    pub fn hash_chain(&self, fingerprints: &[Fingerprint]) -> Fingerprint {
        let mut hasher = Blake3Hasher::new();
        for fingerprint in fingerprints {
            hasher.update(&fingerprint.0);
        }
        Fingerprint(*hasher.finalize().as_bytes())
    }
}
