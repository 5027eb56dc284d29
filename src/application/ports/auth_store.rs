use crate::domain::entities::StoredAuth;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 認証トークンの永続化ポート（キャッシュはメモリのみだがトークンはセッションをまたぐ）
#[async_trait]
pub trait AuthTokenStore: Send + Sync {
    async fn save(&self, auth: &StoredAuth) -> Result<(), AppError>;

    async fn load(&self) -> Result<Option<StoredAuth>, AppError>;

    async fn clear(&self) -> Result<(), AppError>;
}

#[cfg(test)]
mockall::mock! {
    pub TokenStore {}

    #[async_trait]
    impl AuthTokenStore for TokenStore {
        async fn save(&self, auth: &StoredAuth) -> Result<(), AppError>;
        async fn load(&self) -> Result<Option<StoredAuth>, AppError>;
        async fn clear(&self) -> Result<(), AppError>;
    }
}
