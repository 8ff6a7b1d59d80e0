//! In-process counter store
//!
//! Counters live in a `RwLock<HashMap>`; every mutation is a single
//! write-locked read-modify-write, so increments on one key are totally
//! ordered. Expired entries read as zero and are replaced on the next
//! increment. No background sweeper runs: every `purge_interval` increments
//! the store drops expired entries while it already holds the write lock, so
//! the map never holds more than the live keys plus one interval's worth.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::StoreError;

use super::CounterStore;

/// Default number of increments between purges of expired entries
pub const DEFAULT_PURGE_INTERVAL: usize = 1024;

/// Longest expiry an entry can get; longer TTLs are clamped
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

impl CounterEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct Counters {
    entries: HashMap<String, CounterEntry>,
    increments_since_purge: usize,
}

impl Counters {
    fn purge(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.increments_since_purge = 0;
        before - self.entries.len()
    }
}

/// Thread-safe in-memory [`CounterStore`]
#[derive(Debug)]
pub struct MemoryCounterStore {
    counters: RwLock<Counters>,
    purge_interval: usize,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::with_purge_interval(DEFAULT_PURGE_INTERVAL)
    }
}

impl MemoryCounterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that purges expired entries every `interval`
    /// increments (at least every increment)
    pub fn with_purge_interval(interval: usize) -> Self {
        Self {
            counters: RwLock::new(Counters::default()),
            purge_interval: interval.max(1),
        }
    }

    /// Drop expired entries now
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut counters = self.counters.write().map_err(|_| StoreError::Poisoned)?;
        Ok(counters.purge(Instant::now()))
    }

    /// Number of keys currently held, including expired ones not yet purged
    pub fn tracked_keys_count(&self) -> usize {
        self.counters
            .read()
            .map(|c| c.entries.len())
            .unwrap_or(0)
    }
}

/// `now + ttl`, saturating instead of overflowing
fn expiry(now: Instant, ttl: Duration) -> Instant {
    let ttl = ttl.min(MAX_TTL);
    now.checked_add(ttl)
        .or_else(|| now.checked_add(Duration::from_secs(24 * 60 * 60)))
        .unwrap_or(now)
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut counters = self.counters.write().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();

        let entry = counters
            .entries
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry {
                count: 0,
                expires_at: now,
            });

        if !entry.is_live(now) {
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);
        entry.expires_at = expiry(now, ttl);
        let count = entry.count;

        counters.increments_since_purge += 1;
        if counters.increments_since_purge >= self.purge_interval {
            let removed = counters.purge(now);
            if removed > 0 {
                tracing::debug!(removed, "Purged expired rate-limit counters");
            }
        }

        Ok(count)
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        let mut counters = self.counters.write().map_err(|_| StoreError::Poisoned)?;
        counters.entries.remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<u64, StoreError> {
        let counters = self.counters.read().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();

        Ok(counters
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.count)
            .unwrap_or(0))
    }
}
