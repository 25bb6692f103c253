//! Resource identity and payload types.

use std::sync::Arc;

/// Decoded image payload shared between the cache and every caller.
pub type ImagePayload = Arc<image::DynamicImage>;

/// Stable cache key derived from a resource locator.
///
/// Derivation is deterministic: two byte-identical locators always produce
/// the same key. Keys are used only for equality and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Creates a key from a raw string, bypassing locator hashing.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives a key from a resource locator by hashing it.
    #[must_use]
    pub fn from_locator(locator: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(locator.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
