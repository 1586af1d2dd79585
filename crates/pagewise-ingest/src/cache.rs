//! In-memory cache of assembled documents.
//!
//! Keys are `prefix:url`, so one cache can hold several kinds of result for
//! the same URL. Entries expire after a fixed TTL; an expired entry is a miss
//! and is evicted on the lookup that finds it.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use pagewise_core::CleanDocument;
use pagewise_core::config_file::FetchConfig;

/// Default time-to-live: 10 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Entry count at which `insert` first sweeps out expired entries.
pub const SWEEP_THRESHOLD: usize = 256;

#[derive(Clone, Debug)]
struct CacheEntry {
    document: CleanDocument,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct DocumentCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    /// Next sweep happens once `entries` reaches this size.
    sweep_at: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl DocumentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            sweep_at: AtomicUsize::new(SWEEP_THRESHOLD),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config
                .cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TTL),
        )
    }

    pub fn key(prefix: &str, url: &str) -> String {
        format!("{prefix}:{url}")
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, prefix: &str, url: &str) -> Option<CleanDocument> {
        let key = Self::key(prefix, url);
        if let Some(entry) = self.entries.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "document cache hit");
                return Some(entry.document.clone());
            }
            drop(entry);
            self.entries.remove(&key);
            tracing::trace!(key = %key, "document cache entry expired");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, prefix: &str, url: &str, document: CleanDocument) {
        self.entries.insert(
            Self::key(prefix, url),
            CacheEntry {
                document,
                inserted_at: Instant::now(),
            },
        );

        // Sweep when the map reaches the watermark, then move the watermark to
        // twice the live size so a cache full of fresh entries sweeps rarely.
        let len = self.entries.len();
        if len >= self.sweep_at.load(Ordering::Relaxed) {
            let removed = self.evict_expired();
            let live = self.entries.len();
            self.sweep_at
                .store((live * 2).max(SWEEP_THRESHOLD), Ordering::Relaxed);
            tracing::debug!(removed, live, "swept document cache");
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
