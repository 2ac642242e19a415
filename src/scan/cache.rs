//! Content-addressed result cache
//!
//! Keys are SHA-256 digests of the raw image bytes, so byte-identical uploads
//! share one entry. Entries expire lazily after a fixed TTL and the map never
//! holds more than `max_size` entries; when it would, the entry with the
//! oldest insertion time goes. Reads never refresh an entry's age.

use super::types::CombinedArtifact;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default maximum number of cached results
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default time-to-live (1 hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// SHA-256 digest of an image payload
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are plenty for log correlation
        write!(f, "CacheKey({})", hex::encode(&self.0[..8]))
    }
}

struct CacheEntry<V> {
    inserted_at: Instant,
    value: V,
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub max_size: usize,
    pub ttl_secs: u64,
}

/// Thread-safe TTL + size bounded cache keyed by image content
pub struct ScanCache<V = Arc<CombinedArtifact>> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    max_size: usize,
    ttl: Duration,
}

impl<V: Clone> ScanCache<V> {
    /// Create a cache holding at most `max_size` entries (minimum 1) for `ttl` each
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// Look up the result cached for these bytes.
    ///
    /// Expired entries are removed here. Empty input is the "no image"
    /// sentinel and always misses.
    pub fn get(&self, data: &[u8]) -> Option<V> {
        if data.is_empty() {
            return None;
        }

        let key = CacheKey::of(data);
        let now = Instant::now();
        let mut entries = self.lock();

        let expired = match entries.get(&key) {
            None => {
                debug!(key = ?key, "Cache MISS");
                return None;
            }
            Some(entry) => now.saturating_duration_since(entry.inserted_at) >= self.ttl,
        };

        if expired {
            entries.remove(&key);
            debug!(key = ?key, "Cache entry expired");
            return None;
        }

        debug!(key = ?key, "Cache HIT");
        entries.get(&key).map(|entry| entry.value.clone())
    }

    /// Store a result for these bytes, replacing any previous entry.
    ///
    /// Evicts the oldest entry if the size bound would be exceeded; ties on
    /// insertion time go to the smallest digest. Empty input is ignored.
    pub fn set(&self, data: &[u8], value: V) {
        if data.is_empty() {
            return;
        }

        let key = CacheKey::of(data);
        let mut entries = self.lock();

        entries.insert(
            key,
            CacheEntry {
                inserted_at: Instant::now(),
                value,
            },
        );

        if entries.len() > self.max_size {
            let oldest = entries
                .iter()
                .min_by(|(ka, a), (kb, b)| a.inserted_at.cmp(&b.inserted_at).then(ka.cmp(kb)))
                .map(|(k, _)| *k);

            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(evicted = ?oldest, "Cache full, evicted oldest entry");
            }
        }
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            max_size: self.max_size,
            ttl_secs: self.ttl.as_secs(),
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned: PoisonError<_>| {
                warn!("Cache mutex was poisoned, recovering inner value");
                poisoned.into_inner()
            })
    }
}

impl<V: Clone> Default for ScanCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn cache(max_size: usize, ttl_secs: u64) -> ScanCache<String> {
        ScanCache::new(max_size, Duration::from_secs(ttl_secs))
    }

    #[test]
    fn test_key_is_deterministic() {
        assert_eq!(CacheKey::of(b"scan-bytes"), CacheKey::of(b"scan-bytes"));
        assert_ne!(CacheKey::of(b"scan-bytes"), CacheKey::of(b"scan-bytez"));
        assert_eq!(CacheKey::of(b"").to_hex().len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_round_trip() {
        let cache = cache(10, 60);
        cache.set(b"image-a", "result-a".to_string());

        assert_eq!(cache.get(b"image-a"), Some("result-a".to_string()));
        assert_eq!(cache.get(b"image-b"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_existing_entry() {
        let cache = cache(10, 60);
        cache.set(b"image-a", "first".to_string());
        cache.set(b"image-a", "second".to_string());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(b"image-a"), Some("second".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = cache(10, 60);
        cache.set(b"image-a", "result".to_string());

        advance(Duration::from_secs(59)).await;
        assert!(cache.get(b"image-a").is_some());

        advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(b"image-a"), None);
        // Lazy expiry removed it
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_does_not_refresh_age() {
        let cache = cache(10, 10);
        cache.set(b"image-a", "result".to_string());

        for _ in 0..9 {
            advance(Duration::from_secs(1)).await;
            assert_eq!(cache.get(b"image-a"), Some("result".to_string()));
        }

        // 9s of hits, then one more second reaches the original deadline
        advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(b"image-a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_evicts_oldest_insertion() {
        let cache = cache(2, 60);
        cache.set(b"first", "1".to_string());
        advance(Duration::from_millis(10)).await;
        cache.set(b"second", "2".to_string());
        advance(Duration::from_millis(10)).await;

        // A hit on the oldest entry must not save it
        assert!(cache.get(b"first").is_some());
        cache.set(b"third", "3".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(b"first"), None);
        assert_eq!(cache.get(b"second"), Some("2".to_string()));
        assert_eq!(cache.get(b"third"), Some("3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_tie_breaks_on_digest() {
        let cache = cache(1, 60);
        // Paused clock: both entries share one timestamp
        cache.set(b"alpha", "a".to_string());
        cache.set(b"beta", "b".to_string());

        assert_eq!(cache.len(), 1);
        let alpha_smaller = CacheKey::of(b"alpha") < CacheKey::of(b"beta");
        assert_eq!(cache.get(b"alpha").is_some(), !alpha_smaller);
        assert_eq!(cache.get(b"beta").is_some(), alpha_smaller);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_bound_holds_after_every_set() {
        let cache = cache(5, 60);
        for i in 0..20u32 {
            cache.set(&i.to_le_bytes(), i.to_string());
            advance(Duration::from_millis(1)).await;
            assert!(cache.len() <= 5);
        }
        assert_eq!(cache.len(), 5);
        for i in 15..20u32 {
            assert_eq!(cache.get(&i.to_le_bytes()), Some(i.to_string()));
        }
    }

    #[test]
    fn test_empty_input_is_noop() {
        let cache = cache(10, 60);
        cache.set(b"", "nothing".to_string());
        assert!(cache.is_empty());
        assert_eq!(cache.get(b""), None);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(cache(64, 60));
        let handles: Vec<_> = (0..8u8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100u8 {
                        let key = [t, i];
                        cache.set(&key, format!("{}-{}", t, i));
                        let _ = cache.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 64);
    }

    #[test]
    fn test_stats() {
        let cache = cache(3, 120);
        cache.set(b"x", "x".to_string());
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.max_size, 3);
        assert_eq!(stats.ttl_secs, 120);
    }
}
