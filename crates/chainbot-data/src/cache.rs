//! Time-bounded in-memory cache for market data responses.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry<T: Clone> {
    data: T,
    expires_at: Instant,
}

impl<T: Clone> Entry<T> {
    fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Keyed cache whose entries expire after a fixed TTL.
pub struct CandleCache<T: Clone> {
    entries: HashMap<String, Entry<T>>,
    ttl: Duration,
}

impl<T: Clone> CandleCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Cached value for `key` if it has not expired.
    pub fn get(&self, key: &str) -> Option<T> {
        self.entries
            .get(key)
            .filter(|e| e.is_valid())
            .map(|e| e.data.clone())
    }

    pub fn put(&mut self, key: impl Into<String>, data: T) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(key.into(), Entry::new(data, self.ttl));
    }

    /// Drop expired entries.
    pub fn purge(&mut self) {
        self.entries.retain(|_, e| e.is_valid());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
