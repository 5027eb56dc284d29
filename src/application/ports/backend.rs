use crate::domain::entities::{AuthResponse, Fields, RealtimeEvent, Record, RecordPage};
use crate::domain::value_objects::{
    AuthToken, CollectionName, ListQuery, RecordId, SubscriptionTopic,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// ホスト型バックエンド（レコード CRUD・認証・realtime）へのポート
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn list(
        &self,
        collection: &CollectionName,
        query: &ListQuery,
    ) -> Result<RecordPage, AppError>;

    /// 存在しない場合は `AppError::NotFound`
    async fn get(&self, collection: &CollectionName, id: &RecordId) -> Result<Record, AppError>;

    async fn create(&self, collection: &CollectionName, fields: Fields)
    -> Result<Record, AppError>;

    async fn update(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, AppError>;

    async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), AppError>;

    /// 変更ストリームを購読する。返した `RealtimeStream` を close / drop すると購読解除される。
    async fn subscribe(&self, topic: SubscriptionTopic) -> Result<RealtimeStream, AppError>;

    async fn auth_with_password(
        &self,
        collection: &CollectionName,
        identity: &str,
        password: &str,
    ) -> Result<AuthResponse, AppError>;

    async fn auth_refresh(&self, collection: &CollectionName) -> Result<AuthResponse, AppError>;

    async fn set_auth_token(&self, token: Option<AuthToken>);
}

type Closer = Box<dyn FnOnce() + Send>;

/// 購読中の変更ストリーム。購読の解放はこの値の寿命に結び付く。
pub struct RealtimeStream {
    topic: SubscriptionTopic,
    receiver: mpsc::Receiver<RealtimeEvent>,
    closer: Option<Closer>,
}

impl RealtimeStream {
    pub fn new<F>(topic: SubscriptionTopic, receiver: mpsc::Receiver<RealtimeEvent>, closer: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            topic,
            receiver,
            closer: Some(Box::new(closer)),
        }
    }

    pub fn topic(&self) -> &SubscriptionTopic {
        &self.topic
    }

    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.receiver.recv().await
    }

    /// 明示的に購読を解除する
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.receiver.close();
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for RealtimeStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl Stream for RealtimeStream {
    type Item = RealtimeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for RealtimeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeStream")
            .field("topic", &self.topic)
            .field("open", &self.closer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::RealtimeAction;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn drop_runs_closer_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = mpsc::channel(1);
        let counter = Arc::clone(&closed);
        let stream = RealtimeStream::new(
            SubscriptionTopic::Collection(CollectionName::todos()),
            rx,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        stream.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn yields_events_as_a_stream() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = RealtimeStream::new(
            SubscriptionTopic::Collection(CollectionName::todos()),
            rx,
            || {},
        );
        let record = Record::new(RecordId::new("r1").unwrap(), Fields::new());
        tx.send(RealtimeEvent::new(
            RealtimeAction::Create,
            record,
            CollectionName::todos(),
        ))
        .await
        .unwrap();
        drop(tx);

        let event = stream.next().await.unwrap();
        assert_eq!(event.action, RealtimeAction::Create);
        assert!(stream.next().await.is_none());
    }
}

#[cfg(test)]
mockall::mock! {
    pub Backend {}

    #[async_trait]
    impl BackendClient for Backend {
        async fn list(&self, collection: &CollectionName, query: &ListQuery) -> Result<RecordPage, AppError>;
        async fn get(&self, collection: &CollectionName, id: &RecordId) -> Result<Record, AppError>;
        async fn create(&self, collection: &CollectionName, fields: Fields) -> Result<Record, AppError>;
        async fn update(&self, collection: &CollectionName, id: &RecordId, fields: Fields) -> Result<Record, AppError>;
        async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), AppError>;
        async fn subscribe(&self, topic: SubscriptionTopic) -> Result<RealtimeStream, AppError>;
        async fn auth_with_password(&self, collection: &CollectionName, identity: &str, password: &str) -> Result<AuthResponse, AppError>;
        async fn auth_refresh(&self, collection: &CollectionName) -> Result<AuthResponse, AppError>;
        async fn set_auth_token(&self, token: Option<AuthToken>);
    }
}
