use crate::application::ports::backend::BackendClient;
use crate::application::ports::query_cache::{CacheSnapshot, CachedData, QueryCache};
use crate::domain::entities::{Fields, Record};
use crate::domain::value_objects::{CollectionName, QueryFilter, RecordId};
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// 楽観的書き込みの前に取ったスナップショット。失敗時のロールバックにだけ使う。
#[derive(Debug)]
pub struct MutationContext {
    kind: MutationKind,
    collection: CollectionName,
    id: RecordId,
    snapshots: Vec<CacheSnapshot>,
}

impl MutationContext {
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    /// 対象レコードの ID（作成時は仮 ID）
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn snapshots(&self) -> &[CacheSnapshot] {
        &self.snapshots
    }
}

/// 楽観的な create / update / delete。キャッシュを先に書き換え、失敗したら元に戻す。
pub struct OptimisticMutations {
    backend: Arc<dyn BackendClient>,
    cache: Arc<dyn QueryCache>,
}

impl OptimisticMutations {
    pub fn new(backend: Arc<dyn BackendClient>, cache: Arc<dyn QueryCache>) -> Self {
        Self { backend, cache }
    }

    pub async fn create(
        &self,
        collection: &CollectionName,
        fields: Fields,
    ) -> Result<Record, AppError> {
        let context = self.begin_create(collection, fields.clone()).await;
        let result = self.backend.create(collection, fields).await;
        self.settle(context, result).await
    }

    pub async fn update(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        changes: Fields,
    ) -> Result<Record, AppError> {
        let context = self.begin_update(collection, id, &changes).await;
        let result = self.backend.update(collection, id, changes).await;
        self.settle(context, result).await
    }

    pub async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), AppError> {
        let context = self.begin_delete(collection, id).await;
        let result = self.backend.delete(collection, id).await;
        self.settle(context, result).await
    }

    /// 仮レコードを全ての一覧の先頭に差し込む
    pub async fn begin_create(&self, collection: &CollectionName, fields: Fields) -> MutationContext {
        self.cache.begin_mutation(collection).await;
        let lists = QueryFilter::lists(collection);
        self.cache.cancel(&lists).await;

        let placeholder = Record::placeholder(collection, fields);
        let id = placeholder.id.clone();
        let snapshots = self
            .cache
            .update_matching(&lists, &|data| {
                if let CachedData::List(page) = data {
                    page.prepend(placeholder.clone());
                }
            })
            .await;
        debug!(collection = %collection, id = %id, lists = snapshots.len(), "optimistic create");

        MutationContext {
            kind: MutationKind::Create,
            collection: collection.clone(),
            id,
            snapshots,
        }
    }

    /// 一覧と詳細の該当レコードに変更をその場で適用する
    pub async fn begin_update(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        changes: &Fields,
    ) -> MutationContext {
        self.cache.begin_mutation(collection).await;
        let lists = QueryFilter::lists(collection);
        let detail = QueryFilter::detail(collection, id);
        self.cache.cancel(&lists).await;
        self.cache.cancel(&detail).await;

        let mut snapshots = self
            .cache
            .update_matching(&lists, &|data| {
                if let CachedData::List(page) = data {
                    page.patch(id, changes);
                }
            })
            .await;
        snapshots.extend(
            self.cache
                .update_matching(&detail, &|data| {
                    if let CachedData::Detail(record) = data {
                        record.apply_changes(changes);
                    }
                })
                .await,
        );
        debug!(collection = %collection, id = %id, entries = snapshots.len(), "optimistic update");

        MutationContext {
            kind: MutationKind::Update,
            collection: collection.clone(),
            id: id.clone(),
            snapshots,
        }
    }

    /// 一覧から取り除き、詳細エントリを破棄する
    pub async fn begin_delete(&self, collection: &CollectionName, id: &RecordId) -> MutationContext {
        self.cache.begin_mutation(collection).await;
        let lists = QueryFilter::lists(collection);
        let detail = QueryFilter::detail(collection, id);
        self.cache.cancel(&lists).await;
        self.cache.cancel(&detail).await;

        let mut snapshots = self
            .cache
            .update_matching(&lists, &|data| {
                if let CachedData::List(page) = data {
                    page.remove(id);
                }
            })
            .await;
        snapshots.extend(self.cache.remove_matching(&detail).await);
        debug!(collection = %collection, id = %id, entries = snapshots.len(), "optimistic delete");

        MutationContext {
            kind: MutationKind::Delete,
            collection: collection.clone(),
            id: id.clone(),
            snapshots,
        }
    }

    /// バックエンドの結果で楽観的書き込みを確定またはロールバックする。
    /// `begin_*` で始めた保留状態もここで解除する。
    pub async fn settle<T>(
        &self,
        context: MutationContext,
        result: Result<T, AppError>,
    ) -> Result<T, AppError> {
        let collection = context.collection.clone();
        let settled = match result {
            Ok(value) => {
                self.commit(context).await;
                Ok(value)
            }
            Err(err) => {
                warn!(
                    collection = %context.collection,
                    id = %context.id,
                    kind = ?context.kind,
                    error = %err,
                    "mutation failed, rolling back"
                );
                self.rollback(context).await;
                Err(err)
            }
        };
        self.cache.end_mutation(&collection).await;
        settled
    }

    async fn commit(&self, context: MutationContext) {
        self.cache
            .invalidate(&QueryFilter::lists(&context.collection))
            .await;
        if context.kind == MutationKind::Update {
            self.cache
                .invalidate(&QueryFilter::detail(&context.collection, &context.id))
                .await;
        }
    }

    async fn rollback(&self, context: MutationContext) {
        self.cache.restore(context.snapshots).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::backend::MockBackend;
    use crate::domain::value_objects::{ListQuery, QueryKey};
    use crate::infrastructure::cache::QueryCacheStore;
    use serde_json::json;

    fn todo(id: &str, title: &str) -> Record {
        let fields = json!({ "title": title, "completed": false })
            .as_object()
            .cloned()
            .unwrap();
        Record::new(RecordId::new(id).unwrap(), fields)
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn seeded_cache() -> Arc<QueryCacheStore> {
        let cache = Arc::new(QueryCacheStore::new(50, 60));
        let todos = CollectionName::todos();
        let page = crate::domain::entities::RecordPage::new(
            1,
            20,
            2,
            vec![todo("a", "Alpha"), todo("b", "Beta")],
        );
        cache
            .set(QueryKey::list(&todos, &ListQuery::default()), CachedData::List(page))
            .await;
        cache
            .set(
                QueryKey::detail(&todos, &RecordId::new("a").unwrap()),
                CachedData::Detail(todo("a", "Alpha")),
            )
            .await;
        cache
    }

    fn list_key() -> QueryKey {
        QueryKey::list(&CollectionName::todos(), &ListQuery::default())
    }

    #[tokio::test]
    async fn failed_create_restores_every_list() {
        let cache = seeded_cache().await;
        let before = cache.snapshot(&QueryFilter::collection(&CollectionName::todos())).await;

        let mut backend = MockBackend::new();
        backend
            .expect_create()
            .times(1)
            .returning(|_, _| Err(AppError::from_status(400, "Failed to create record.")));
        let mutations = OptimisticMutations::new(Arc::new(backend), cache.clone());

        let err = mutations
            .create(&CollectionName::todos(), fields(json!({ "title": "Gamma" })))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Failed to create record.");

        let after = cache.snapshot(&QueryFilter::collection(&CollectionName::todos())).await;
        assert_eq!(before.len(), after.len());
        for snapshot in before {
            assert_eq!(cache.entry(&snapshot.key).await, Some(snapshot.entry));
        }
    }

    #[tokio::test]
    async fn begin_create_prepends_placeholder_and_cancels_list_fetches() {
        let cache = seeded_cache().await;
        let ticket = cache.begin_fetch(&list_key()).await;
        let mutations = OptimisticMutations::new(Arc::new(MockBackend::new()), cache.clone());

        let context = mutations
            .begin_create(&CollectionName::todos(), fields(json!({ "title": "Gamma" })))
            .await;
        assert!(context.id().is_placeholder());
        assert_eq!(context.snapshots().len(), 1);

        let page = cache.get(&list_key()).await.unwrap().data.into_list().unwrap();
        assert_eq!(page.items[0].id, *context.id());
        assert_eq!(page.items[0].get_str("title"), Some("Gamma"));
        assert_eq!(page.total_items, 3);

        let stale = crate::domain::entities::RecordPage::empty(1, 20);
        assert!(!cache.complete_fetch(ticket, CachedData::List(stale)).await);
    }

    #[tokio::test]
    async fn successful_update_patches_then_invalidates() {
        let cache = seeded_cache().await;
        let mut backend = MockBackend::new();
        backend
            .expect_update()
            .times(1)
            .returning(|_, id, changes| {
                let mut record = todo(id.as_str(), "Alpha");
                record.apply_changes(&changes);
                Ok(record)
            });
        let mutations = OptimisticMutations::new(Arc::new(backend), cache.clone());
        let id = RecordId::new("a").unwrap();

        mutations
            .update(
                &CollectionName::todos(),
                &id,
                fields(json!({ "completed": true })),
            )
            .await
            .unwrap();

        let list = cache.get(&list_key()).await.unwrap();
        assert!(list.is_stale);
        let page = list.data.into_list().unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].get_bool("completed"), Some(true));

        let detail_key = QueryKey::detail(&CollectionName::todos(), &id);
        let detail = cache.get(&detail_key).await.unwrap();
        assert!(detail.is_stale);
        assert_eq!(detail.data.as_detail().unwrap().get_bool("completed"), Some(true));
    }

    #[tokio::test]
    async fn failed_delete_puts_record_and_detail_back() {
        let cache = seeded_cache().await;
        let mutations = OptimisticMutations::new(Arc::new(MockBackend::new()), cache.clone());
        let id = RecordId::new("a").unwrap();
        let detail_key = QueryKey::detail(&CollectionName::todos(), &id);

        let context = mutations.begin_delete(&CollectionName::todos(), &id).await;
        let page = cache.get(&list_key()).await.unwrap().data.into_list().unwrap();
        assert_eq!(page.total_items, 1);
        assert!(!page.contains(&id));
        assert!(cache.get(&detail_key).await.is_none());

        let result = mutations
            .settle(context, Err::<(), _>(AppError::Network("offline".into())))
            .await;
        assert!(result.is_err());

        let page = cache.get(&list_key()).await.unwrap().data.into_list().unwrap();
        assert_eq!(page.total_items, 2);
        assert!(page.contains(&id));
        assert!(cache.get(&detail_key).await.is_some());
    }

    #[tokio::test]
    async fn pending_create_blocks_list_refresh_until_settled() {
        let cache = seeded_cache().await;
        let todos = CollectionName::todos();
        let mutations = OptimisticMutations::new(Arc::new(MockBackend::new()), cache.clone());

        let context = mutations
            .begin_create(&todos, fields(json!({ "title": "Gamma" })))
            .await;
        assert!(cache.has_pending_mutation(&todos).await);

        let ticket = cache.begin_fetch(&list_key()).await;
        let server = crate::domain::entities::RecordPage::new(1, 20, 2, vec![todo("a", "Alpha")]);
        assert!(!cache.complete_fetch(ticket, CachedData::List(server.clone())).await);
        let page = cache.get(&list_key()).await.unwrap().data.into_list().unwrap();
        assert_eq!(page.items[0].get_str("title"), Some("Gamma"));

        mutations
            .settle(context, Ok::<_, AppError>(todo("c", "Gamma")))
            .await
            .unwrap();
        assert!(!cache.has_pending_mutation(&todos).await);

        let ticket = cache.begin_fetch(&list_key()).await;
        assert!(cache.complete_fetch(ticket, CachedData::List(server)).await);
    }

    #[tokio::test]
    async fn delete_of_uncached_record_still_floors_totals_at_zero() {
        let cache = Arc::new(QueryCacheStore::new(10, 60));
        cache
            .set(
                list_key(),
                CachedData::List(crate::domain::entities::RecordPage::empty(1, 20)),
            )
            .await;
        let mut backend = MockBackend::new();
        backend.expect_delete().times(1).returning(|_, _| Ok(()));
        let mutations = OptimisticMutations::new(Arc::new(backend), cache.clone());

        mutations
            .delete(&CollectionName::todos(), &RecordId::new("zzz").unwrap())
            .await
            .unwrap();
        let page = cache.get(&list_key()).await.unwrap().data.into_list().unwrap();
        assert_eq!(page.total_items, 0);
    }

    #[tokio::test]
    async fn repeating_an_update_keeps_the_same_entry() {
        let cache = seeded_cache().await;
        let mutations = OptimisticMutations::new(Arc::new(MockBackend::new()), cache.clone());
        let todos = CollectionName::todos();
        let id = RecordId::new("a").unwrap();
        let detail_key = QueryKey::detail(&todos, &id);
        let changes = fields(json!({ "completed": true }));

        mutations.begin_update(&todos, &id, &changes).await;
        let mut once = cache.get(&detail_key).await.unwrap().data.into_detail().unwrap();
        let once_page = cache.get(&list_key()).await.unwrap().data.into_list().unwrap();

        mutations.begin_update(&todos, &id, &changes).await;
        let twice = cache.get(&detail_key).await.unwrap().data.into_detail().unwrap();
        let twice_page = cache.get(&list_key()).await.unwrap().data.into_list().unwrap();

        once.updated = twice.updated;
        assert_eq!(once, twice);
        assert_eq!(once_page.total_items, twice_page.total_items);
        assert_eq!(
            once_page.items.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
            twice_page.items.iter().map(|r| r.id.clone()).collect::<Vec<_>>()
        );
    }
}
