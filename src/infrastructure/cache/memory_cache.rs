//! In-memory resource cache implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::{ImagePayload, ResourceKey};
use crate::domain::ports::ResourceCachePort;

/// In-memory cache for decoded images.
/// Thread-safe; reads and writes never touch I/O.
///
/// Retention is unbounded: entries persist until [`ResourceCachePort::remove`]
/// or [`ResourceCachePort::clear`], a known limitation of this baseline.
pub struct MemoryResourceCache {
    entries: RwLock<HashMap<ResourceKey, ImagePayload>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryResourceCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
        }
    }
}

impl Default for MemoryResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}

impl ResourceCachePort for MemoryResourceCache {
    fn get(&self, key: &ResourceKey) -> Option<ImagePayload> {
        let entries = self.entries.read();
        if let Some(payload) = entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(payload.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    fn put(&self, key: ResourceKey, payload: ImagePayload) {
        debug!(key = %key, "Storing image in memory cache");
        self.entries.write().insert(key, payload);
    }

    fn remove(&self, key: &ResourceKey) {
        if self.entries.write().remove(key).is_some() {
            debug!(key = %key, "Removed image from memory cache");
        }
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
        debug!("Cleared memory image cache");
    }
}
