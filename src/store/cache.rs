use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::Page;

pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub page: u32,
    pub keyword: String,
}

impl CacheKey {
    pub fn new(page: u32, keyword: &str) -> Self {
        Self { page, keyword: keyword.to_string() }
    }
}

struct CacheEntry<T> {
    page: Page<T>,
    captured_at: Instant,
}

/// Short-lived page snapshots keyed by (page, keyword).
pub struct PageCache<T> {
    ttl: Duration,
    entries: HashMap<CacheKey, CacheEntry<T>>,
}

impl<T: Clone> PageCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    /// Expired entries are dropped on lookup and never returned.
    pub fn get(&mut self, key: &CacheKey) -> Option<Page<T>> {
        let fresh = self
            .entries
            .get(key)
            .map(|entry| entry.captured_at.elapsed() < self.ttl)?;

        if fresh {
            self.entries.get(key).map(|entry| entry.page.clone())
        } else {
            self.entries.remove(key);
            None
        }
    }

    pub fn insert(&mut self, key: CacheKey, page: Page<T>) {
        self.entries.insert(key, CacheEntry { page, captured_at: Instant::now() });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
