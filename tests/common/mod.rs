#![allow(dead_code)]

use pocket_starter_lib::{
    domain::{entities::Fields, value_objects::CollectionName},
    infrastructure::{InMemoryBackend, MemoryTokenStore},
    AppConfig, AppState,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct-horse";

/// 再試行なし・キャッシュは 60 秒 fresh
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.cache.retry_count = 0;
    config.cache.retry_delay_ms = 1;
    config.cache.stale_time = 60;
    config
}

pub fn app_with_store(backend: &InMemoryBackend, store: Arc<MemoryTokenStore>) -> AppState {
    AppState::with_backend(test_config(), Arc::new(backend.clone()), store)
        .expect("app state")
}

pub fn app(backend: &InMemoryBackend) -> AppState {
    app_with_store(backend, Arc::new(MemoryTokenStore::new()))
}

/// 既定のキャッシュ設定（stale_time 0）で、再試行だけ切る
pub fn app_with_default_cache(backend: &InMemoryBackend) -> AppState {
    let mut config = AppConfig::default();
    config.cache.retry_count = 0;
    AppState::with_backend(
        config,
        Arc::new(backend.clone()),
        Arc::new(MemoryTokenStore::new()),
    )
    .expect("app state")
}

pub fn todo_fields(title: &str) -> Fields {
    json!({ "title": title, "completed": false })
        .as_object()
        .cloned()
        .expect("object")
}

pub async fn seed_todos(backend: &InMemoryBackend, titles: &[&str]) {
    for title in titles {
        backend.seed(&CollectionName::todos(), todo_fields(title)).await;
        // `-created` の並び順を安定させる
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// 条件が成立するまで最大 2 秒待つ
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
