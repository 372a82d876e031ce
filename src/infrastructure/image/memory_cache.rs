//! Two-tier in-memory artwork cache.
//!
//! Thumbnails and full-size bitmaps live in separate maps keyed by card id.
//! Both tiers are unbounded unless a capacity is configured, in which case
//! each tier evicts least-recently-used entries.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{Bitmap, CardId, ImageTier};

/// In-memory cache for decoded artwork.
/// Thread-safe; completions on worker threads and lookups on the UI thread share it.
pub struct CacheStore {
    thumbnails: Mutex<LruCache<CardId, Bitmap>>,
    fullsize: Mutex<LruCache<CardId, Bitmap>>,
    capacity: Option<NonZeroUsize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    /// Creates a cache. `None` keeps every entry for the process lifetime.
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        let capacity = capacity.map(|c| NonZeroUsize::new(c).unwrap_or(NonZeroUsize::MIN));
        let tier = || capacity.map_or_else(LruCache::unbounded, LruCache::new);
        Self {
            thumbnails: Mutex::new(tier()),
            fullsize: Mutex::new(tier()),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates an unbounded cache.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    fn tier(&self, tier: ImageTier) -> &Mutex<LruCache<CardId, Bitmap>> {
        match tier {
            ImageTier::Thumbnail => &self.thumbnails,
            ImageTier::FullSize => &self.fullsize,
        }
    }

    /// Looks up an entry in the given tier.
    pub fn get(&self, tier: ImageTier, id: CardId) -> Option<Bitmap> {
        let found = self.tier(tier).lock().get(&id).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(card_id = %id, %tier, "Memory cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(card_id = %id, %tier, "Memory cache miss");
        }
        found
    }

    /// Stores an entry, replacing any existing entry for the same id.
    pub fn put(&self, tier: ImageTier, id: CardId, image: Bitmap) {
        let replaced = self.tier(tier).lock().put(id, image).is_some();
        debug!(card_id = %id, %tier, replaced, "Stored image in memory cache");
    }

    /// Returns the cached thumbnail for `id`.
    pub fn get_thumb(&self, id: CardId) -> Option<Bitmap> {
        self.get(ImageTier::Thumbnail, id)
    }

    /// Stores a thumbnail, last write wins.
    pub fn put_thumb(&self, id: CardId, image: Bitmap) {
        self.put(ImageTier::Thumbnail, id, image);
    }

    /// Returns the cached full-size bitmap for `id`.
    pub fn get_fullsize(&self, id: CardId) -> Option<Bitmap> {
        self.get(ImageTier::FullSize, id)
    }

    /// Stores a full-size bitmap, last write wins.
    pub fn put_fullsize(&self, id: CardId, image: Bitmap) {
        self.put(ImageTier::FullSize, id, image);
    }

    /// Peeks at an entry without promoting it or touching statistics.
    pub fn peek(&self, tier: ImageTier, id: CardId) -> Option<Bitmap> {
        self.tier(tier).lock().peek(&id).cloned()
    }

    /// Removes an entry from both tiers.
    pub fn evict(&self, id: CardId) {
        let thumb = self.thumbnails.lock().pop(&id).is_some();
        let full = self.fullsize.lock().pop(&id).is_some();
        if thumb || full {
            debug!(card_id = %id, "Evicted image from memory cache");
        }
    }

    /// Number of entries in a tier.
    #[must_use]
    pub fn len(&self, tier: ImageTier) -> usize {
        self.tier(tier).lock().len()
    }

    /// Returns true if both tiers are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len(ImageTier::Thumbnail) == 0 && self.len(ImageTier::FullSize) == 0
    }

    /// Clears both tiers.
    pub fn clear(&self) {
        self.thumbnails.lock().clear();
        self.fullsize.lock().clear();
        debug!("Cleared memory image cache");
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
            thumbnails: self.len(ImageTier::Thumbnail),
            fullsize: self.len(ImageTier::FullSize),
            capacity: self.capacity.map(NonZeroUsize::get),
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
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
    /// Current number of cached thumbnails.
    pub thumbnails: usize,
    /// Current number of cached full-size bitmaps.
    pub fullsize: usize,
    /// Per-tier capacity, if bounded.
    pub capacity: Option<usize>,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} thumbnails, {} full-size, {:.1}% hit rate ({} hits, {} misses)",
            self.thumbnails, self.fullsize, self.hit_rate, self.hits, self.misses
        )
    }
}
