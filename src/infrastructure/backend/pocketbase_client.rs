use super::realtime;
use crate::application::ports::backend::{BackendClient, RealtimeStream};
use crate::domain::entities::{AuthResponse, Fields, Record, RecordPage};
use crate::domain::value_objects::{
    AuthToken, CollectionName, ListQuery, RecordId, SubscriptionTopic,
};
use crate::shared::config::BackendConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// バックエンドのエラーボディ（`{code, message, data}`）
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// PocketBase 互換 REST / SSE API のアダプタ
pub struct PocketBaseClient {
    base_url: String,
    http: Client,
    stream_http: Client,
    token: RwLock<Option<AuthToken>>,
    realtime_buffer: usize,
}

impl PocketBaseClient {
    pub fn new(config: &BackendConfig) -> Result<Self, AppError> {
        let trimmed = config.base_url.trim();
        if trimmed.is_empty() {
            return Err(AppError::ConfigurationError(
                "Backend URL is empty".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout.max(1)))
            .build()
            .map_err(|err| AppError::ConfigurationError(err.to_string()))?;
        // SSE 接続は長寿命なので全体タイムアウトを付けない
        let stream_http = Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout.max(1)))
            .build()
            .map_err(|err| AppError::ConfigurationError(err.to_string()))?;
        Ok(Self {
            base_url: trimmed.trim_end_matches('/').to_string(),
            http,
            stream_http,
            token: RwLock::new(None),
            realtime_buffer: config.realtime_buffer,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn records_path(collection: &CollectionName) -> String {
        format!("/api/collections/{collection}/records")
    }

    fn record_path(collection: &CollectionName, id: &RecordId) -> String {
        format!("/api/collections/{collection}/records/{id}")
    }

    async fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        match self.token.read().await.as_ref() {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        }
    }
}

async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AppError> {
    let response = builder
        .send()
        .await
        .map_err(|err| AppError::Network(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status, &body))
}

async fn request_json<T: DeserializeOwned>(builder: reqwest::RequestBuilder) -> Result<T, AppError> {
    let response = send(builder).await?;
    let body = response
        .text()
        .await
        .map_err(|err| AppError::Network(err.to_string()))?;
    serde_json::from_str(&body).map_err(|err| AppError::DeserializationError(err.to_string()))
}

fn error_from_body(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|parsed| parsed.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed.")
                .to_string()
        });
    AppError::from_status(status.as_u16(), message)
}

#[async_trait]
impl BackendClient for PocketBaseClient {
    async fn list(
        &self,
        collection: &CollectionName,
        query: &ListQuery,
    ) -> Result<RecordPage, AppError> {
        debug!(collection = %collection, page = query.page, "backend list");
        let builder = self
            .request(Method::GET, &Self::records_path(collection))
            .await
            .query(&query.to_params());
        request_json(builder).await
    }

    async fn get(&self, collection: &CollectionName, id: &RecordId) -> Result<Record, AppError> {
        let builder = self
            .request(Method::GET, &Self::record_path(collection, id))
            .await;
        request_json(builder).await
    }

    async fn create(
        &self,
        collection: &CollectionName,
        fields: Fields,
    ) -> Result<Record, AppError> {
        let builder = self
            .request(Method::POST, &Self::records_path(collection))
            .await
            .json(&fields);
        request_json(builder).await
    }

    async fn update(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, AppError> {
        let builder = self
            .request(Method::PATCH, &Self::record_path(collection, id))
            .await
            .json(&fields);
        request_json(builder).await
    }

    async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), AppError> {
        let builder = self
            .request(Method::DELETE, &Self::record_path(collection, id))
            .await;
        send(builder).await?;
        Ok(())
    }

    async fn subscribe(&self, topic: SubscriptionTopic) -> Result<RealtimeStream, AppError> {
        let token = self.token.read().await.clone();
        realtime::open_subscription(
            &self.stream_http,
            &self.base_url,
            token,
            topic,
            self.realtime_buffer,
        )
        .await
    }

    async fn auth_with_password(
        &self,
        collection: &CollectionName,
        identity: &str,
        password: &str,
    ) -> Result<AuthResponse, AppError> {
        let builder = self
            .request(
                Method::POST,
                &format!("/api/collections/{collection}/auth-with-password"),
            )
            .await
            .json(&json!({ "identity": identity, "password": password }));
        request_json(builder).await
    }

    async fn auth_refresh(&self, collection: &CollectionName) -> Result<AuthResponse, AppError> {
        let builder = self
            .request(
                Method::POST,
                &format!("/api/collections/{collection}/auth-refresh"),
            )
            .await;
        request_json(builder).await
    }

    async fn set_auth_token(&self, token: Option<AuthToken>) {
        *self.token.write().await = token;
    }
}
