//! Render Cache - Compiled Templates by Fingerprint
//!
//! Lookups take a read lock. Compilation happens outside any lock, so two
//! threads racing on a fresh fingerprint may both compile; the first insert
//! wins and the loser adopts the stored entry.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::hashing::Fingerprint;

/// Eviction bounds. The default keeps every entry for the life of the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Least-recently-used entries are evicted past this count
    pub max_entries: Option<usize>,
    /// Entries older than this are recompiled on next use
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_entries: usize) -> Self {
        Self { max_entries: Some(max_entries), ttl: None }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub compilations: u64,
    pub evictions: u64,
    pub collisions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryInfo {
    pub fingerprint: Fingerprint,
    pub source_len: usize,
    pub compiled_at: DateTime<Utc>,
}

struct CacheEntry<C> {
    compiled: Arc<C>,
    source: String,
    inserted_at: Instant,
    compiled_at: DateTime<Utc>,
    last_used: AtomicU64,
}

impl<C> CacheEntry<C> {
    fn touch(&self, tick: u64) {
        self.last_used.store(tick, Ordering::Relaxed);
    }
}

enum Lookup<C> {
    Hit(Arc<C>),
    Miss,
    Expired,
    Collision,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
    evictions: AtomicU64,
    collisions: AtomicU64,
}

/// Thread-safe map from fingerprint to compiled template.
pub struct RenderCache<C> {
    entries: RwLock<HashMap<Fingerprint, CacheEntry<C>>>,
    config: CacheConfig,
    clock: AtomicU64,
    counters: Counters,
}

impl<C> RenderCache<C> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// Return the compiled form of `source`, compiling it on a miss.
    ///
    /// A stored entry is reused only when its source text equals `source`
    /// and it has not outlived the TTL. A compile error leaves the cache
    /// untouched.
    pub fn get_or_compile<E, F>(&self, key: &Fingerprint, source: &str, compile: F) -> Result<Arc<C>, E>
    where
        F: FnOnce() -> Result<C, E>,
    {
        match self.lookup(key, source) {
            Lookup::Hit(compiled) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(compiled);
            }
            Lookup::Collision => {
                self.counters.collisions.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    fingerprint = %key,
                    "Fingerprint collision between distinct template bodies, recompiling"
                );
            }
            Lookup::Expired => {
                tracing::debug!(fingerprint = key.short(), "Cached template expired");
            }
            Lookup::Miss => {}
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(compile()?);
        self.counters.compilations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(fingerprint = key.short(), "Compiled template");

        Ok(self.insert(key, source, compiled))
    }

    fn lookup(&self, key: &Fingerprint, source: &str) -> Lookup<C> {
        let entries = self.entries.read();
        match entries.get(key) {
            None => Lookup::Miss,
            Some(entry) if entry.source != source => Lookup::Collision,
            Some(entry) if self.is_expired(entry) => Lookup::Expired,
            Some(entry) => {
                entry.touch(self.tick());
                Lookup::Hit(Arc::clone(&entry.compiled))
            }
        }
    }

    fn insert(&self, key: &Fingerprint, source: &str, compiled: Arc<C>) -> Arc<C> {
        if self.config.max_entries == Some(0) {
            return compiled;
        }

        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(key) {
            if existing.source == source && !self.is_expired(existing) {
                // Another thread stored the same body while we compiled.
                existing.touch(self.tick());
                return Arc::clone(&existing.compiled);
            }
        } else if let Some(max) = self.config.max_entries {
            while entries.len() >= max {
                if !self.evict_lru(&mut entries) {
                    break;
                }
            }
        }

        let entry = CacheEntry {
            compiled: Arc::clone(&compiled),
            source: source.to_string(),
            inserted_at: Instant::now(),
            compiled_at: Utc::now(),
            last_used: AtomicU64::new(self.tick()),
        };
        entries.insert(key.clone(), entry);
        compiled
    }

    fn evict_lru(&self, entries: &mut HashMap<Fingerprint, CacheEntry<C>>) -> bool {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
            .map(|(key, _)| key.clone());

        match oldest {
            Some(key) => {
                entries.remove(&key);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(fingerprint = key.short(), "Evicted least recently used template");
                true
            }
            None => false,
        }
    }

    fn is_expired(&self, entry: &CacheEntry<C>) -> bool {
        self.config
            .ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Drop every entry past its TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        if self.config.ttl.is_none() {
            return 0;
        }
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry));
        let removed = before - entries.len();
        self.counters.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            compilations: self.counters.compilations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            collisions: self.counters.collisions.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of cached entries ordered by fingerprint.
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let mut infos: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(key, entry)| CacheEntryInfo {
                fingerprint: key.clone(),
                source_len: entry.source.len(),
                compiled_at: entry.compiled_at,
            })
            .collect();
        infos.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        infos
    }
}

impl<C> Default for RenderCache<C> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn key(s: &str) -> Fingerprint {
        Fingerprint::new(s)
    }

    fn compile_ok(source: &str) -> impl FnOnce() -> Result<String, Infallible> + '_ {
        move || Ok(source.to_uppercase())
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = RenderCache::default();
        let a = cache.get_or_compile(&key("k"), "abc", compile_ok("abc")).unwrap();
        let b = cache
            .get_or_compile(&key("k"), "abc", || -> Result<String, Infallible> {
                panic!("must not recompile")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.compilations, 1);
    }

    #[test]
    fn test_compile_error_not_cached() {
        let cache: RenderCache<String> = RenderCache::default();
        let err = cache.get_or_compile(&key("k"), "bad", || Err::<String, _>("boom"));
        assert_eq!(err.unwrap_err(), "boom");
        assert!(cache.is_empty());
        assert_eq!(cache.stats().compilations, 0);
    }

    #[test]
    fn test_collision_replaces_entry() {
        let cache = RenderCache::default();
        let a = cache.get_or_compile(&key("same"), "one", compile_ok("one")).unwrap();
        let b = cache.get_or_compile(&key("same"), "two", compile_ok("two")).unwrap();
        assert_eq!(*a, "ONE");
        assert_eq!(*b, "TWO");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().collisions, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = RenderCache::new(CacheConfig::bounded(2));
        cache.get_or_compile(&key("a"), "a", compile_ok("a")).unwrap();
        cache.get_or_compile(&key("b"), "b", compile_ok("b")).unwrap();
        // refresh "a" so "b" becomes the oldest
        cache.get_or_compile(&key("a"), "a", compile_ok("a")).unwrap();
        cache.get_or_compile(&key("c"), "c", compile_ok("c")).unwrap();

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let cache = RenderCache::new(CacheConfig::bounded(0));
        let v = cache.get_or_compile(&key("a"), "a", compile_ok("a")).unwrap();
        assert_eq!(*v, "A");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = RenderCache::new(CacheConfig::unbounded().with_ttl(Duration::from_millis(20)));
        cache.get_or_compile(&key("a"), "a", compile_ok("a")).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        cache.get_or_compile(&key("a"), "a", compile_ok("a")).unwrap();
        assert_eq!(cache.stats().compilations, 2);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_snapshot() {
        let cache = RenderCache::default();
        cache.get_or_compile(&key("b"), "bb", compile_ok("bb")).unwrap();
        cache.get_or_compile(&key("a"), "a", compile_ok("a")).unwrap();
        let infos = cache.entries();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].fingerprint, key("a"));
        assert_eq!(infos[1].source_len, 2);

        cache.clear();
        assert!(cache.entries().is_empty());
    }
}
