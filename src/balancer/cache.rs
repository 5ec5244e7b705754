use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedUrl {
    long: String,
    stored_at: Instant,
}

/// Bounded `short -> long` cache with per-entry age.
///
/// Lookups use `peek`, so the eviction order is insertion/refresh order only: when
/// full, the entry stored longest ago goes first. Entries older than the TTL are
/// treated as misses and removed by `sweep`.
pub struct UrlCache {
    entries: LruCache<String, CachedUrl>,
    ttl: Duration,
}

impl UrlCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    pub fn get(&self, short: &str) -> Option<String> {
        self.get_at(short, Instant::now())
    }

    pub fn get_at(&self, short: &str, now: Instant) -> Option<String> {
        self.entries
            .peek(short)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) <= self.ttl)
            .map(|entry| entry.long.clone())
    }

    /// Inserts or overwrites `short`, restarting its age.
    pub fn insert(&mut self, short: &str, long: &str) {
        self.insert_at(short, long, Instant::now());
    }

    pub fn insert_at(&mut self, short: &str, long: &str, now: Instant) {
        self.entries.put(
            short.to_string(),
            CachedUrl {
                long: long.to_string(),
                stored_at: now,
            },
        );
    }

    /// Removes every entry older than the TTL; returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.stored_at) > self.ttl)
            .map(|(short, _)| short.clone())
            .collect();

        for short in &expired {
            self.entries.pop(short);
        }
        expired.len()
    }

    pub fn contains(&self, short: &str) -> bool {
        self.entries.contains(short)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
