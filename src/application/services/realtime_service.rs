use crate::application::ports::backend::BackendClient;
use crate::application::ports::query_cache::{CachedData, QueryCache};
use crate::domain::entities::RealtimeEvent;
use crate::domain::value_objects::{
    CollectionName, QueryFilter, QueryKey, RealtimeAction, RecordId, SubscriptionTopic,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 既定のキャッシュ処理の前に呼ばれるコールバック
pub type RealtimeCallback = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// 購読ハンドル。close するか drop すると購読が解除される。
#[derive(Debug)]
pub struct RealtimeSubscription {
    topic: SubscriptionTopic,
    task: Option<JoinHandle<()>>,
}

impl RealtimeSubscription {
    fn active(topic: SubscriptionTopic, task: JoinHandle<()>) -> Self {
        Self {
            topic,
            task: Some(task),
        }
    }

    fn degraded(topic: SubscriptionTopic) -> Self {
        Self { topic, task: None }
    }

    pub fn topic(&self) -> &SubscriptionTopic {
        &self.topic
    }

    /// 購読に失敗して realtime なしで動いている
    pub fn is_degraded(&self) -> bool {
        self.task.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!(topic = %self.topic, "realtime unsubscribed");
        }
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// バックエンドの変更通知でキャッシュを無効化・更新する
pub struct RealtimeSync {
    backend: Arc<dyn BackendClient>,
    cache: Arc<dyn QueryCache>,
}

impl RealtimeSync {
    pub fn new(backend: Arc<dyn BackendClient>, cache: Arc<dyn QueryCache>) -> Self {
        Self { backend, cache }
    }

    pub async fn subscribe_collection(
        &self,
        collection: &CollectionName,
        callback: Option<RealtimeCallback>,
    ) -> RealtimeSubscription {
        self.subscribe(SubscriptionTopic::Collection(collection.clone()), callback)
            .await
    }

    /// 単一レコードだけを購読する（他のレコードのイベントは無視）
    pub async fn subscribe_record(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        callback: Option<RealtimeCallback>,
    ) -> RealtimeSubscription {
        self.subscribe(
            SubscriptionTopic::Record(collection.clone(), id.clone()),
            callback,
        )
        .await
    }

    async fn subscribe(
        &self,
        topic: SubscriptionTopic,
        callback: Option<RealtimeCallback>,
    ) -> RealtimeSubscription {
        let mut stream = match self.backend.subscribe(topic.clone()).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(topic = %topic, error = %err, "realtime subscription failed, continuing without live updates");
                return RealtimeSubscription::degraded(topic);
            }
        };
        info!(topic = %topic, "realtime subscription started");

        let cache = Arc::clone(&self.cache);
        let filter = topic.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = stream.recv().await {
                if !filter.accepts(&event.collection, &event.record.id) {
                    continue;
                }
                if let Some(callback) = callback.as_ref() {
                    callback(&event);
                }
                apply_event(cache.as_ref(), &event).await;
            }
            debug!(topic = %filter, "realtime stream ended");
        });
        RealtimeSubscription::active(topic, task)
    }
}

/// 1 件のイベントをキャッシュへ反映する
pub async fn apply_event(cache: &dyn QueryCache, event: &RealtimeEvent) {
    let collection = &event.collection;
    let id = &event.record.id;
    debug!(collection = %collection, id = %id, action = %event.action, "realtime event");
    match event.action {
        RealtimeAction::Create => {}
        RealtimeAction::Update => {
            cache
                .replace_if_present(
                    &QueryKey::detail(collection, id),
                    CachedData::Detail(event.record.clone()),
                )
                .await;
        }
        RealtimeAction::Delete => {
            cache
                .remove_matching(&QueryFilter::detail(collection, id))
                .await;
        }
    }
    cache.invalidate(&QueryFilter::lists(collection)).await;
}
