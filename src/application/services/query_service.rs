use crate::application::ports::backend::BackendClient;
use crate::application::ports::query_cache::{CachedData, QueryCache};
use crate::domain::entities::{Record, RecordPage};
use crate::domain::value_objects::{CollectionName, ListQuery, QueryKey, RecordId};
use crate::shared::config::CacheConfig;
use crate::shared::error::AppError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// 読み取りクエリの再試行ポリシー（指数バックオフ、上限 30 秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            retries: config.retry_count,
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn none() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    let delay = self.delay_for(attempt);
                    warn!(query = label, attempt = attempt + 1, error = %err, "query failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// キャッシュ経由の読み取り。ミスまたは stale のときだけバックエンドへ取りに行く。
/// コレクションに楽観的書き込みが保留中なら、stale でもキャッシュをそのまま返す。
pub struct QueryService {
    backend: Arc<dyn BackendClient>,
    cache: Arc<dyn QueryCache>,
    retry: RetryPolicy,
}

impl QueryService {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        cache: Arc<dyn QueryCache>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            cache,
            retry,
        }
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    pub async fn list(
        &self,
        collection: &CollectionName,
        query: &ListQuery,
    ) -> Result<RecordPage, AppError> {
        let key = QueryKey::list(collection, query);
        if let Some(lookup) = self.cache.get(&key).await {
            if !lookup.is_stale || self.cache.has_pending_mutation(collection).await {
                if let Some(page) = lookup.data.into_list() {
                    debug!(key = %key, "cache hit");
                    return Ok(page);
                }
            }
        }
        self.fetch_list(collection, query).await
    }

    /// キャッシュを無視して取り直す
    pub async fn fetch_list(
        &self,
        collection: &CollectionName,
        query: &ListQuery,
    ) -> Result<RecordPage, AppError> {
        let key = QueryKey::list(collection, query);
        let ticket = self.cache.begin_fetch(&key).await;
        let result = self
            .retry
            .run(&key.to_string(), || self.backend.list(collection, query))
            .await;
        match result {
            Ok(page) => {
                self.cache
                    .complete_fetch(ticket, CachedData::List(page.clone()))
                    .await;
                Ok(page)
            }
            Err(err) => {
                self.cache.abandon_fetch(ticket).await;
                Err(err)
            }
        }
    }

    pub async fn detail(
        &self,
        collection: &CollectionName,
        id: &RecordId,
    ) -> Result<Record, AppError> {
        let key = QueryKey::detail(collection, id);
        if let Some(lookup) = self.cache.get(&key).await {
            if !lookup.is_stale || self.cache.has_pending_mutation(collection).await {
                if let Some(record) = lookup.data.into_detail() {
                    debug!(key = %key, "cache hit");
                    return Ok(record);
                }
            }
        }
        self.fetch_detail(collection, id).await
    }

    pub async fn fetch_detail(
        &self,
        collection: &CollectionName,
        id: &RecordId,
    ) -> Result<Record, AppError> {
        let key = QueryKey::detail(collection, id);
        let ticket = self.cache.begin_fetch(&key).await;
        let result = self
            .retry
            .run(&key.to_string(), || self.backend.get(collection, id))
            .await;
        match result {
            Ok(record) => {
                self.cache
                    .complete_fetch(ticket, CachedData::Detail(record.clone()))
                    .await;
                Ok(record)
            }
            Err(err) => {
                self.cache.abandon_fetch(ticket).await;
                if matches!(err, AppError::NotFound(_)) {
                    self.cache.remove(&key).await;
                }
                Err(err)
            }
        }
    }

    /// フェッチせずにキャッシュの内容だけを見る
    pub async fn peek_list(
        &self,
        collection: &CollectionName,
        query: &ListQuery,
    ) -> Option<RecordPage> {
        self.cache
            .get(&QueryKey::list(collection, query))
            .await
            .and_then(|lookup| lookup.data.into_list())
    }

    pub async fn peek_detail(&self, collection: &CollectionName, id: &RecordId) -> Option<Record> {
        self.cache
            .get(&QueryKey::detail(collection, id))
            .await
            .and_then(|lookup| lookup.data.into_detail())
    }
}
