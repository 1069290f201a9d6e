//! Hashing System - SHA-256 Template Fingerprints
//!
//! A fingerprint identifies a template body by content. Identical bytes always
//! map to the same fingerprint, so they share one compiled template.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Content digest used as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, enough to tell entries apart in logs.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives a fingerprint from template text.
///
/// The renderer only relies on equal text producing equal fingerprints.
/// Distinct text sharing a fingerprint is detected by the cache.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, content: &str) -> Fingerprint;
}

/// Default fingerprinter: SHA-256 over the UTF-8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Fingerprinter;

impl Fingerprinter for Sha256Fingerprinter {
    fn fingerprint(&self, content: &str) -> Fingerprint {
        Fingerprint(sha256_hex(content.as_bytes()))
    }
}

impl<F> Fingerprinter for F
where
    F: Fn(&str) -> Fingerprint + Send + Sync,
{
    fn fingerprint(&self, content: &str) -> Fingerprint {
        self(content)
    }
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
