use super::session::{SessionReader, SessionWriter};
use crate::application::ports::auth_store::AuthTokenStore;
use crate::application::ports::backend::BackendClient;
use crate::application::ports::query_cache::QueryCache;
use crate::domain::entities::{AuthResponse, AuthSession, AuthUser, Fields, StoredAuth};
use crate::domain::value_objects::CollectionName;
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const AUTH_FAILED_MESSAGE: &str = "Failed to authenticate.";
pub const MIN_PASSWORD_LEN: usize = 8;

/// 認証フロー。セッションの書き込みはこのサービスだけが行う。
pub struct AuthService {
    backend: Arc<dyn BackendClient>,
    store: Arc<dyn AuthTokenStore>,
    cache: Arc<dyn QueryCache>,
    session: SessionWriter,
    auth_collection: CollectionName,
}

impl AuthService {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        store: Arc<dyn AuthTokenStore>,
        cache: Arc<dyn QueryCache>,
        session: SessionWriter,
        auth_collection: CollectionName,
    ) -> Self {
        Self {
            backend,
            store,
            cache,
            session,
            auth_collection,
        }
    }

    pub fn session(&self) -> SessionReader {
        self.session.reader()
    }

    pub fn current_session(&self) -> AuthSession {
        self.session.reader().current()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, AppError> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(AppError::validation(
                ValidationFailureKind::RequiredField,
                "Password is required.",
            ));
        }

        let response = self
            .backend
            .auth_with_password(&self.auth_collection, &email, password)
            .await
            .map_err(|err| {
                warn!(error = %err, "password authentication failed");
                match err {
                    AppError::Network(_) => err,
                    _ => AppError::Auth(AUTH_FAILED_MESSAGE.to_string()),
                }
            })?;
        let user = self.establish(response).await;
        info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    /// ユーザーを作成してそのままログインする
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        password_confirm: &str,
        name: Option<&str>,
    ) -> Result<AuthUser, AppError> {
        let email = validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(
                ValidationFailureKind::PasswordTooShort,
                format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
            ));
        }
        if password != password_confirm {
            return Err(AppError::validation(
                ValidationFailureKind::PasswordMismatch,
                "Passwords do not match.",
            ));
        }

        let mut fields = Fields::new();
        fields.insert("email".into(), Value::String(email.clone()));
        fields.insert("password".into(), Value::String(password.to_string()));
        fields.insert(
            "passwordConfirm".into(),
            Value::String(password_confirm.to_string()),
        );
        fields.insert("emailVisibility".into(), Value::Bool(true));
        if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
            fields.insert("name".into(), Value::String(name.to_string()));
        }
        self.backend.create(&self.auth_collection, fields).await?;
        info!("account created");

        self.login(&email, password).await
    }

    /// トークン・保存済み認証情報・キャッシュを全て破棄する
    pub async fn logout(&self) {
        self.backend.set_auth_token(None).await;
        if let Err(err) = self.store.clear().await {
            error!(error = %err, "failed to clear stored auth");
        }
        self.session.publish(AuthSession::signed_out());
        self.cache.clear().await;
        info!("signed out");
    }

    /// 保存済みトークンからセッションを復元する。期限切れ・更新失敗なら破棄する。
    pub async fn restore_session(&self) -> Result<Option<AuthUser>, AppError> {
        let Some(stored) = self.store.load().await? else {
            return Ok(None);
        };
        if !stored.token.is_valid() {
            info!("stored token expired");
            self.discard_credentials().await;
            return Ok(None);
        }

        self.backend.set_auth_token(Some(stored.token)).await;
        match self.backend.auth_refresh(&self.auth_collection).await {
            Ok(response) => {
                let user = self.establish(response).await;
                info!(user_id = %user.id, "session restored");
                Ok(Some(user))
            }
            Err(err) => {
                warn!(error = %err, "session refresh failed, discarding stored auth");
                self.discard_credentials().await;
                Ok(None)
            }
        }
    }

    pub async fn refresh(&self) -> Result<AuthUser, AppError> {
        match self.backend.auth_refresh(&self.auth_collection).await {
            Ok(response) => Ok(self.establish(response).await),
            Err(AppError::Network(msg)) => Err(AppError::Network(msg)),
            Err(err) => {
                warn!(error = %err, "token refresh rejected");
                self.discard_credentials().await;
                Err(AppError::Auth(AUTH_FAILED_MESSAGE.to_string()))
            }
        }
    }

    async fn establish(&self, response: AuthResponse) -> AuthUser {
        let user = AuthUser::from(&response.record);
        self.backend
            .set_auth_token(Some(response.token.clone()))
            .await;
        if let Err(err) = self.store.save(&StoredAuth::from(response)).await {
            error!(error = %err, "failed to persist auth");
        }
        self.session.publish(AuthSession::signed_in(user.clone()));
        user
    }

    async fn discard_credentials(&self) {
        self.backend.set_auth_token(None).await;
        if let Err(err) = self.store.clear().await {
            error!(error = %err, "failed to clear stored auth");
        }
        self.session.publish(AuthSession::signed_out());
    }
}

fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::validation(
            ValidationFailureKind::RequiredField,
            "Email is required.",
        ));
    }
    if !email.contains('@') {
        return Err(AppError::validation(
            ValidationFailureKind::InvalidEmail,
            "Please enter a valid email address.",
        ));
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::auth_store::MockTokenStore;
    use crate::application::ports::backend::MockBackend;
    use crate::application::ports::query_cache::CachedData;
    use crate::application::services::session::session_channel;
    use crate::domain::entities::{Record, RecordPage};
    use crate::domain::value_objects::auth_token::token_expiring_at;
    use crate::domain::value_objects::{ListQuery, QueryKey, RecordId};
    use crate::infrastructure::cache::QueryCacheStore;
    use chrono::Utc;
    use mockall::predicate::*;
    use serde_json::json;

    fn user_record() -> Record {
        let fields = json!({ "email": "ada@example.com", "name": "Ada" })
            .as_object()
            .cloned()
            .unwrap();
        Record::new(RecordId::new("u1").unwrap(), fields)
    }

    fn auth_response() -> AuthResponse {
        AuthResponse {
            token: token_expiring_at(Utc::now().timestamp() + 3600),
            record: user_record(),
        }
    }

    fn service(backend: MockBackend, store: MockTokenStore) -> (AuthService, Arc<QueryCacheStore>) {
        let cache = Arc::new(QueryCacheStore::new(10, 60));
        let (writer, _reader) = session_channel();
        let service = AuthService::new(
            Arc::new(backend),
            Arc::new(store),
            cache.clone(),
            writer,
            CollectionName::users(),
        );
        (service, cache)
    }

    #[tokio::test]
    async fn login_publishes_session_and_persists_token() {
        let mut backend = MockBackend::new();
        backend
            .expect_auth_with_password()
            .withf(|collection, identity, password| {
                collection.as_str() == "users" && identity == "ada@example.com" && password == "pw"
            })
            .times(1)
            .returning(|_, _, _| Ok(auth_response()));
        backend
            .expect_set_auth_token()
            .withf(|token| token.is_some())
            .times(1)
            .returning(|_| ());
        let mut store = MockTokenStore::new();
        store.expect_save().times(1).returning(|_| Ok(()));
        let (service, _cache) = service(backend, store);
        let reader = service.session();

        let user = service.login(" ada@example.com ", "pw").await.unwrap();
        assert_eq!(user.display_name(), "Ada");
        assert!(reader.current().is_authenticated);
    }

    #[tokio::test]
    async fn login_rejection_becomes_generic_auth_error() {
        let mut backend = MockBackend::new();
        backend
            .expect_auth_with_password()
            .times(1)
            .returning(|_, _, _| Err(AppError::from_status(400, "Invalid login credentials.")));
        let (service, _cache) = service(backend, MockTokenStore::new());

        let err = service.login("ada@example.com", "wrong").await.unwrap_err();
        assert!(matches!(&err, AppError::Auth(msg) if msg == AUTH_FAILED_MESSAGE));
        assert!(!service.current_session().is_authenticated);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_backend() {
        let (service, _cache) = service(MockBackend::new(), MockTokenStore::new());

        let err = service.login("not-an-email", "pw").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::ValidationError {
                kind: ValidationFailureKind::InvalidEmail,
                ..
            }
        ));
        let err = service
            .signup("ada@example.com", "short", "short", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::ValidationError {
                kind: ValidationFailureKind::PasswordTooShort,
                ..
            }
        ));
        let err = service
            .signup("ada@example.com", "long-enough", "different", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::ValidationError {
                kind: ValidationFailureKind::PasswordMismatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let mut backend = MockBackend::new();
        backend
            .expect_set_auth_token()
            .with(eq(None))
            .times(1)
            .returning(|_| ());
        let mut store = MockTokenStore::new();
        store.expect_clear().times(1).returning(|| Ok(()));
        let (service, cache) = service(backend, store);
        cache
            .set(
                QueryKey::list(&CollectionName::todos(), &ListQuery::default()),
                CachedData::List(RecordPage::empty(1, 20)),
            )
            .await;

        service.logout().await;
        assert!(cache.keys().await.is_empty());
        assert!(!service.current_session().is_authenticated);
    }

    #[tokio::test]
    async fn expired_stored_token_is_discarded_without_refresh() {
        let mut backend = MockBackend::new();
        backend.expect_auth_refresh().never();
        backend
            .expect_set_auth_token()
            .with(eq(None))
            .times(1)
            .returning(|_| ());
        let mut store = MockTokenStore::new();
        store.expect_load().times(1).returning(|| {
            Ok(Some(StoredAuth {
                token: token_expiring_at(Utc::now().timestamp() - 60),
                record: user_record(),
            }))
        });
        store.expect_clear().times(1).returning(|| Ok(()));
        let (service, _cache) = service(backend, store);

        assert!(service.restore_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn valid_stored_token_is_refreshed() {
        let mut backend = MockBackend::new();
        backend.expect_set_auth_token().times(2).returning(|_| ());
        backend
            .expect_auth_refresh()
            .times(1)
            .returning(|_| Ok(auth_response()));
        let mut store = MockTokenStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|| Ok(Some(StoredAuth::from(auth_response()))));
        store.expect_save().times(1).returning(|_| Ok(()));
        let (service, _cache) = service(backend, store);

        let user = service.restore_session().await.unwrap().unwrap();
        assert_eq!(user.id.as_str(), "u1");
        assert!(service.current_session().is_authenticated);
    }
}
