//! Search result cache (C7)
//!
//! TTL-bounded with LRU eviction at capacity. Entries expire lazily on
//! access; no I/O happens under the lock.

use super::SearchResultSet;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

struct CacheEntry {
    result: SearchResultSet,
    inserted_at: Instant,
}

struct Inner {
    entries: HashMap<Uuid, CacheEntry>,
    recency: VecDeque<Uuid>,
}

pub struct SearchCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Store a result set, evicting least-recently-used entries when full.
    pub fn put(&self, result: &SearchResultSet) {
        let mut inner = self.inner.lock().unwrap();
        let id = result.search_id;
        inner.entries.insert(
            id,
            CacheEntry {
                result: result.clone(),
                inserted_at: Instant::now(),
            },
        );
        inner.recency.retain(|x| *x != id);
        inner.recency.push_back(id);

        while inner.entries.len() > self.capacity {
            // Recency holds only live ids after the retain above
            match inner.recency.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Fetch a result set by id. Expired entries are removed and reported
    /// as a miss; a hit refreshes recency.
    pub fn get(&self, search_id: &Uuid) -> Option<SearchResultSet> {
        let mut inner = self.inner.lock().unwrap();
        let expired = match inner.entries.get(search_id) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            inner.entries.remove(search_id);
            inner.recency.retain(|x| x != search_id);
            return None;
        }
        inner.recency.retain(|x| x != search_id);
        inner.recency.push_back(*search_id);
        inner.entries.get(search_id).map(|e| e.result.clone())
    }

    /// Remove an entry, reporting whether it was present.
    pub fn evict(&self, search_id: &Uuid) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.recency.retain(|x| x != search_id);
        inner.entries.remove(search_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result_set(query: &str) -> SearchResultSet {
        SearchResultSet {
            search_id: Uuid::new_v4(),
            query: query.to_string(),
            results: Vec::new(),
            unique_documents: Vec::new(),
            chunk_ids: Vec::new(),
            collections_searched: Vec::new(),
            timestamp: Utc::now(),
            processing_time: 0.0,
        }
    }

    #[test]
    fn test_put_and_get() {
        let cache = SearchCache::new(10, Duration::from_secs(60));
        let set = result_set("alpha");
        cache.put(&set);
        let fetched = cache.get(&set.search_id).unwrap();
        assert_eq!(fetched.query, "alpha");
        assert!(cache.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = SearchCache::new(10, Duration::from_millis(30));
        let set = result_set("alpha");
        cache.put(&set);
        assert!(cache.get(&set.search_id).is_some());
        std::thread::sleep(Duration::from_millis(50));
        assert!(cache.get(&set.search_id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let cache = SearchCache::new(2, Duration::from_secs(60));
        let first = result_set("one");
        let second = result_set("two");
        let third = result_set("three");

        cache.put(&first);
        cache.put(&second);
        // Touch the first so the second becomes least recently used
        assert!(cache.get(&first.search_id).is_some());
        cache.put(&third);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&first.search_id).is_some());
        assert!(cache.get(&second.search_id).is_none());
        assert!(cache.get(&third.search_id).is_some());
    }

    #[test]
    fn test_evict() {
        let cache = SearchCache::new(10, Duration::from_secs(60));
        let set = result_set("alpha");
        cache.put(&set);
        assert!(cache.evict(&set.search_id));
        assert!(!cache.evict(&set.search_id));
        assert!(cache.get(&set.search_id).is_none());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        let cache = Arc::new(SearchCache::new(100, Duration::from_secs(60)));
        let sets: Vec<_> = (0..16).map(|i| result_set(&format!("q{i}"))).collect();

        let handles: Vec<_> = sets
            .iter()
            .map(|set| {
                let cache = Arc::clone(&cache);
                let set = set.clone();
                std::thread::spawn(move || {
                    cache.put(&set);
                    assert!(cache.get(&set.search_id).is_some());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
    }
}
