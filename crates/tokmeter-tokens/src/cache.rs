//! Bounded token-count cache.
//!
//! Entries are keyed by the exact input text and hold one count per
//! strategy. The cache is not LRU: when it is full, the oldest-inserted
//! texts are dropped until half of the capacity remains, then the new text
//! is inserted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::types::TokenMethod;

#[derive(Debug, Default, Clone, Copy)]
struct CachedCounts {
    heuristic: Option<usize>,
    exact: Option<usize>,
}

impl CachedCounts {
    fn get(&self, method: TokenMethod) -> Option<usize> {
        match method {
            TokenMethod::Heuristic => self.heuristic,
            TokenMethod::Exact => self.exact,
            TokenMethod::Auto => None,
        }
    }

    fn set(&mut self, method: TokenMethod, count: usize) {
        match method {
            TokenMethod::Heuristic => self.heuristic = Some(count),
            TokenMethod::Exact => self.exact = Some(count),
            TokenMethod::Auto => {}
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<Arc<str>, CachedCounts>,
    /// Insertion order, oldest first
    order: VecDeque<Arc<str>>,
}

/// Thread-safe bounded cache from text to token count.
#[derive(Debug)]
pub struct TokenCache {
    capacity: usize,
    inner: RwLock<CacheInner>,
}

impl TokenCache {
    /// Create a cache holding at most `capacity` texts.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached texts.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the count for `text` under a resolved strategy.
    pub fn get(&self, method: TokenMethod, text: &str) -> Option<usize> {
        self.read().entries.get(text).and_then(|c| c.get(method))
    }

    /// Store the count for `text` under a resolved strategy.
    pub fn insert(&self, method: TokenMethod, text: &str, count: usize) {
        if self.capacity == 0 || method == TokenMethod::Auto {
            return;
        }

        let mut inner = self.write();

        if let Some(existing) = inner.entries.get_mut(text) {
            existing.set(method, count);
            return;
        }

        if inner.entries.len() >= self.capacity {
            let keep = self.capacity / 2;
            let before = inner.entries.len();
            while inner.entries.len() > keep {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            debug!(
                evicted = before - inner.entries.len(),
                remaining = inner.entries.len(),
                "token cache full, dropped oldest entries"
            );
        }

        let key: Arc<str> = Arc::from(text);
        let mut counts = CachedCounts::default();
        counts.set(method, count);
        inner.order.push_back(Arc::clone(&key));
        inner.entries.insert(key, counts);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.entries.clear();
        inner.order.clear();
    }

    // A panic while holding the lock cannot leave the maps half-updated in a
    // way that breaks lookups, so poisoning is ignored.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
