//! Bounded, time-expiring result cache
//!
//! Keyed by content hash, capped by capacity with insertion-order (FIFO)
//! eviction, and independently expired by age. This is deliberately not an
//! LRU: a read never refreshes an entry's position, so the oldest *inserted*
//! entry is always the first evicted.
//!
//! All access goes through an internal mutex; the pipeline runs on a
//! preemptively-scheduled runtime and the cache is its only cross-call
//! shared state.

use crate::config::CacheConfig;
use crate::types::{ImageInput, ProcessingResult};
use instant::Instant;
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A cached extraction result plus its insertion time
struct CacheEntry {
    result: ProcessingResult,
    created_at: Instant,
}

/// Cache occupancy and traffic counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Resident entries
    pub entries: usize,
    /// Configured capacity
    pub capacity: usize,
    /// Reads served from the cache
    pub hits: u64,
    /// Reads that found nothing (or an expired entry)
    pub misses: u64,
    /// Entries evicted by capacity
    pub evictions: u64,
    /// Entries dropped by age
    pub expirations: u64,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    insertion_order: VecDeque<String>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Bounded FIFO cache of extraction results
pub struct ResultCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl ResultCache {
    /// Create an empty cache with the given sizing and expiry
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
        }
    }

    /// Derive the cache key for an input
    ///
    /// The key hashes the actual byte content together with the identity
    /// attributes (name, declared type, modification time), so two distinct
    /// files never collide even when their identity tuples match.
    #[must_use]
    pub fn key_for(input: &ImageInput) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&input.bytes);
        hasher.update(input.name.as_bytes());
        hasher.update(input.mime.as_str().as_bytes());
        hasher.update(input.modified_at.unwrap_or(0).to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a result; an entry older than the TTL is deleted and misses
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ProcessingResult> {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let lookup = match inner.entries.get(key) {
            Some(entry) if entry.created_at.elapsed() <= self.config.ttl => {
                Some(entry.result.clone())
            },
            Some(_) => None,
            None => {
                inner.misses += 1;
                return None;
            },
        };

        match lookup {
            Some(result) => {
                inner.hits += 1;
                debug!("Cache hit for {key}");
                Some(result)
            },
            None => {
                debug!("Cache entry for {key} expired");
                inner.entries.remove(key);
                inner.insertion_order.retain(|k| k != key);
                inner.expirations += 1;
                inner.misses += 1;
                None
            },
        }
    }

    /// Insert a result, evicting the oldest-inserted entry at capacity
    pub fn insert(&self, key: String, result: ProcessingResult) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        if inner.entries.contains_key(&key) {
            // Re-insert keeps the original queue position
            inner.entries.insert(
                key,
                CacheEntry {
                    result,
                    created_at: Instant::now(),
                },
            );
            return;
        }

        while inner.entries.len() >= self.config.capacity {
            if let Some(oldest) = inner.insertion_order.pop_front() {
                inner.entries.remove(&oldest);
                inner.evictions += 1;
                debug!("Evicted oldest cache entry {oldest}");
            } else {
                break;
            }
        }

        inner.insertion_order.push_back(key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                result,
                created_at: Instant::now(),
            },
        );
    }

    /// Drop all entries (counters are preserved)
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.clear();
        inner.insertion_order.clear();
    }

    /// Snapshot occupancy and traffic counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        CacheStats {
            entries: inner.entries.len(),
            capacity: self.config.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ResultCache")
            .field("entries", &stats.entries)
            .field("capacity", &stats.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EncodedImage, ImageMime};
    use std::time::Duration;

    fn sample_result(tag: u8) -> ProcessingResult {
        ProcessingResult {
            original: EncodedImage::new(vec![tag], ImageMime::Png),
            extracted: EncodedImage::new(vec![tag, tag], ImageMime::Png),
            width: 10,
            height: 10,
            processing_time_ms: 5,
            from_cache: false,
        }
    }

    fn small_cache(capacity: usize) -> ResultCache {
        ResultCache::new(CacheConfig {
            capacity,
            ttl: Duration::from_secs(3600),
        })
    }

    #[test]
    fn test_insert_then_get() {
        let cache = small_cache(4);
        cache.insert("a".to_string(), sample_result(1));

        let hit = cache.get("a").unwrap();
        assert_eq!(hit.original.bytes, vec![1]);
        assert!(cache.get("missing").is_none());

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_inserted() {
        let cache = small_cache(3);
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            cache.insert((*key).to_string(), sample_result(i as u8));
        }

        // Touch "a" — FIFO eviction must ignore recency of access
        assert!(cache.get("a").is_some());

        cache.insert("d".to_string(), sample_result(9));
        let stats = cache.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.evictions, 1);

        // "a" was the oldest *inserted* entry, so it is gone despite the
        // recent read; this is FIFO, not LRU
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("d").is_some());
    }

    #[test]
    fn test_overflow_leaves_exactly_capacity_entries() {
        let cache = small_cache(10);
        for i in 0..25u8 {
            cache.insert(format!("key-{i}"), sample_result(i));
        }
        let stats = cache.stats();
        assert_eq!(stats.entries, 10);
        assert_eq!(stats.evictions, 15);
        // The 10 most recently inserted survive
        assert!(cache.get("key-14").is_none());
        assert!(cache.get("key-15").is_some());
        assert!(cache.get("key-24").is_some());
    }

    #[test]
    fn test_expired_entry_misses_and_is_deleted() {
        let cache = ResultCache::new(CacheConfig {
            capacity: 4,
            ttl: Duration::ZERO,
        });
        cache.insert("a".to_string(), sample_result(1));

        assert!(cache.get("a").is_none());
        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_clear() {
        let cache = small_cache(4);
        cache.insert("a".to_string(), sample_result(1));
        cache.insert("b".to_string(), sample_result(2));
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_key_depends_on_content_not_just_identity() {
        // Same identity tuple, different bytes: keys must differ
        let a = ImageInput::new("art.png", vec![1, 2, 3]).with_modified_at(42);
        let b = ImageInput::new("art.png", vec![9, 9, 9]).with_modified_at(42);
        assert_ne!(ResultCache::key_for(&a), ResultCache::key_for(&b));

        // Identical inputs produce identical keys
        let c = ImageInput::new("art.png", vec![1, 2, 3]).with_modified_at(42);
        assert_eq!(ResultCache::key_for(&a), ResultCache::key_for(&c));
    }

    #[test]
    fn test_reinsert_keeps_queue_position() {
        let cache = small_cache(2);
        cache.insert("a".to_string(), sample_result(1));
        cache.insert("b".to_string(), sample_result(2));
        // Refresh "a" in place; it remains the oldest-inserted key
        cache.insert("a".to_string(), sample_result(3));

        cache.insert("c".to_string(), sample_result(4));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }
}
