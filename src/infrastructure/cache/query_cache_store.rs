use crate::application::ports::query_cache::{
    CacheEntry, CacheLookup, CacheSnapshot, CacheUpdater, CachedData, FetchTicket, QueryCache,
};
use crate::domain::value_objects::{CollectionName, QueryFilter, QueryKey};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct Inner {
    entries: LruCache<QueryKey, CacheEntry>,
    in_flight: HashMap<QueryKey, u64>,
    next_generation: u64,
    pending: HashMap<CollectionName, usize>,
}

impl Inner {
    fn matching_keys(&self, filter: &QueryFilter) -> Vec<QueryKey> {
        self.entries
            .iter()
            .filter(|(key, _)| filter.matches(key))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// クエリキャッシュ（プロセス内で 1 つ、メモリのみ）
#[derive(Clone)]
pub struct QueryCacheStore {
    inner: Arc<RwLock<Inner>>,
    stale_time: Duration,
}

impl QueryCacheStore {
    /// `stale_time_seconds` を過ぎたエントリは stale として扱う
    pub fn new(max_entries: usize, stale_time_seconds: u64) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
                next_generation: 0,
                pending: HashMap::new(),
            })),
            stale_time: Duration::seconds(stale_time_seconds.min(i64::MAX as u64) as i64),
        }
    }

    fn is_stale(&self, entry: &CacheEntry) -> bool {
        entry.is_invalidated || Utc::now() - entry.updated_at >= self.stale_time
    }

    fn fresh_entry(data: CachedData) -> CacheEntry {
        CacheEntry {
            data,
            updated_at: Utc::now(),
            is_invalidated: false,
        }
    }

    /// キャッシュサイズを取得
    pub async fn size(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

impl Default for QueryCacheStore {
    fn default() -> Self {
        Self::new(500, 60)
    }
}

#[async_trait]
impl QueryCache for QueryCacheStore {
    async fn get(&self, key: &QueryKey) -> Option<CacheLookup> {
        let mut inner = self.inner.write().await;
        let entry = inner.entries.get(key)?;
        Some(CacheLookup {
            data: entry.data.clone(),
            is_stale: self.is_stale(entry),
        })
    }

    async fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        let inner = self.inner.read().await;
        inner.entries.peek(key).cloned()
    }

    async fn set(&self, key: QueryKey, data: CachedData) {
        let mut inner = self.inner.write().await;
        debug!(key = %key, "cache set");
        inner.entries.put(key, Self::fresh_entry(data));
    }

    async fn replace_if_present(&self, key: &QueryKey, data: CachedData) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entries.peek_mut(key) {
            Some(entry) => {
                debug!(key = %key, "cache replace");
                *entry = Self::fresh_entry(data);
                true
            }
            None => false,
        }
    }

    async fn remove(&self, key: &QueryKey) -> Option<CachedData> {
        let mut inner = self.inner.write().await;
        inner.in_flight.remove(key);
        inner.entries.pop(key).map(|entry| entry.data)
    }

    async fn snapshot(&self, filter: &QueryFilter) -> Vec<CacheSnapshot> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|(key, _)| filter.matches(key))
            .map(|(key, entry)| CacheSnapshot {
                key: key.clone(),
                entry: entry.clone(),
            })
            .collect()
    }

    async fn update_matching(
        &self,
        filter: &QueryFilter,
        updater: CacheUpdater<'_>,
    ) -> Vec<CacheSnapshot> {
        let mut inner = self.inner.write().await;
        let keys = inner.matching_keys(filter);
        let mut snapshots = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = inner.entries.peek_mut(&key) {
                snapshots.push(CacheSnapshot {
                    key: key.clone(),
                    entry: entry.clone(),
                });
                updater(&mut entry.data);
            }
        }
        debug!(collection = %filter.collection, touched = snapshots.len(), "cache update_matching");
        snapshots
    }

    async fn remove_matching(&self, filter: &QueryFilter) -> Vec<CacheSnapshot> {
        let mut inner = self.inner.write().await;
        let keys = inner.matching_keys(filter);
        let mut snapshots = Vec::with_capacity(keys.len());
        for key in keys {
            inner.in_flight.remove(&key);
            if let Some(entry) = inner.entries.pop(&key) {
                snapshots.push(CacheSnapshot { key, entry });
            }
        }
        snapshots
    }

    async fn restore(&self, snapshots: Vec<CacheSnapshot>) {
        let mut inner = self.inner.write().await;
        for snapshot in snapshots {
            debug!(key = %snapshot.key, "cache restore");
            inner.entries.put(snapshot.key, snapshot.entry);
        }
    }

    async fn invalidate(&self, filter: &QueryFilter) -> usize {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if filter.matches(key) {
                entry.is_invalidated = true;
                count += 1;
            }
        }
        debug!(collection = %filter.collection, kind = ?filter.kind, count, "cache invalidate");
        count
    }

    async fn cancel(&self, filter: &QueryFilter) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.in_flight.len();
        inner.in_flight.retain(|key, _| !filter.matches(key));
        before - inner.in_flight.len()
    }

    async fn begin_fetch(&self, key: &QueryKey) -> FetchTicket {
        let mut inner = self.inner.write().await;
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.in_flight.insert(key.clone(), generation);
        FetchTicket {
            key: key.clone(),
            generation,
        }
    }

    async fn complete_fetch(&self, ticket: FetchTicket, data: CachedData) -> bool {
        let mut inner = self.inner.write().await;
        if inner.in_flight.get(&ticket.key) != Some(&ticket.generation) {
            debug!(key = %ticket.key, "discarding cancelled fetch result");
            return false;
        }
        inner.in_flight.remove(&ticket.key);
        if inner.pending.contains_key(ticket.key.collection()) {
            debug!(key = %ticket.key, "mutation pending, keeping optimistic entry");
            return false;
        }
        inner.entries.put(ticket.key, Self::fresh_entry(data));
        true
    }

    async fn abandon_fetch(&self, ticket: FetchTicket) {
        let mut inner = self.inner.write().await;
        if inner.in_flight.get(&ticket.key) == Some(&ticket.generation) {
            inner.in_flight.remove(&ticket.key);
        }
    }

    async fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.read().await.in_flight.contains_key(key)
    }

    async fn keys(&self) -> Vec<QueryKey> {
        let inner = self.inner.read().await;
        inner.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.in_flight.clear();
    }

    async fn begin_mutation(&self, collection: &CollectionName) {
        let mut inner = self.inner.write().await;
        *inner.pending.entry(collection.clone()).or_insert(0) += 1;
    }

    async fn end_mutation(&self, collection: &CollectionName) {
        let mut inner = self.inner.write().await;
        if let Some(count) = inner.pending.get_mut(collection) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                inner.pending.remove(collection);
            }
        }
    }

    async fn has_pending_mutation(&self, collection: &CollectionName) -> bool {
        self.inner.read().await.pending.contains_key(collection)
    }
}
