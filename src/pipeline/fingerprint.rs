// src/pipeline/fingerprint.rs

//! Fingerprint computation.

use sha2::{Digest, Sha256};

/// SHA-256 over the UTF-8 bytes of normalized text, as lowercase hex.
///
/// Deterministic and unsalted: equal normalized content always produces an
/// equal digest, which is the whole equality proxy.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
