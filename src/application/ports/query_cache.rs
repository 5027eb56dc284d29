use crate::domain::entities::{Record, RecordPage};
use crate::domain::value_objects::{CollectionName, QueryFilter, QueryKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// キャッシュに保持するサーバー応答
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    List(RecordPage),
    Detail(Record),
}

impl CachedData {
    pub fn as_list(&self) -> Option<&RecordPage> {
        match self {
            CachedData::List(page) => Some(page),
            CachedData::Detail(_) => None,
        }
    }

    pub fn as_detail(&self) -> Option<&Record> {
        match self {
            CachedData::Detail(record) => Some(record),
            CachedData::List(_) => None,
        }
    }

    pub fn into_list(self) -> Option<RecordPage> {
        match self {
            CachedData::List(page) => Some(page),
            CachedData::Detail(_) => None,
        }
    }

    pub fn into_detail(self) -> Option<Record> {
        match self {
            CachedData::Detail(record) => Some(record),
            CachedData::List(_) => None,
        }
    }
}

/// キーごとのエントリ（データ・書き込み時刻・無効化フラグ）
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: CachedData,
    pub updated_at: DateTime<Utc>,
    pub is_invalidated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub data: CachedData,
    pub is_stale: bool,
}

/// 変更前のエントリ。ロールバックでそのまま書き戻す。
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    pub key: QueryKey,
    pub entry: CacheEntry,
}

/// 進行中フェッチの世代。キャンセル後に完了したフェッチは書き込めない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: QueryKey,
    pub generation: u64,
}

pub type CacheUpdater<'a> = &'a (dyn Fn(&mut CachedData) + Send + Sync);

#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn get(&self, key: &QueryKey) -> Option<CacheLookup>;

    async fn entry(&self, key: &QueryKey) -> Option<CacheEntry>;

    async fn set(&self, key: QueryKey, data: CachedData);

    /// キーが既にある場合だけ書き込み、新しいエントリとして扱う
    async fn replace_if_present(&self, key: &QueryKey, data: CachedData) -> bool;

    async fn remove(&self, key: &QueryKey) -> Option<CachedData>;

    async fn snapshot(&self, filter: &QueryFilter) -> Vec<CacheSnapshot>;

    /// フィルタに一致する全エントリを 1 回のロックでスナップショットしてから書き換える
    async fn update_matching(
        &self,
        filter: &QueryFilter,
        updater: CacheUpdater<'_>,
    ) -> Vec<CacheSnapshot>;

    /// フィルタに一致する全エントリをスナップショットしてから破棄する
    async fn remove_matching(&self, filter: &QueryFilter) -> Vec<CacheSnapshot>;

    async fn restore(&self, snapshots: Vec<CacheSnapshot>);

    /// stale にして次回読み取りで再取得させる
    async fn invalidate(&self, filter: &QueryFilter) -> usize;

    /// 進行中フェッチを打ち切る（完了しても書き込まれない）
    async fn cancel(&self, filter: &QueryFilter) -> usize;

    async fn begin_fetch(&self, key: &QueryKey) -> FetchTicket;

    /// 書き込めたら true。キャンセル済みか、コレクションに保留中の書き込みがあれば false。
    async fn complete_fetch(&self, ticket: FetchTicket, data: CachedData) -> bool;

    async fn abandon_fetch(&self, ticket: FetchTicket);

    async fn is_fetching(&self, key: &QueryKey) -> bool;

    async fn keys(&self) -> Vec<QueryKey>;

    /// 楽観的書き込みの開始。終わるまでフェッチ結果はこのコレクションへ書き込まれない。
    async fn begin_mutation(&self, collection: &CollectionName);

    async fn end_mutation(&self, collection: &CollectionName);

    async fn has_pending_mutation(&self, collection: &CollectionName) -> bool;

    async fn clear(&self);
}
