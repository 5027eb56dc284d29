use crate::application::ports::auth_store::AuthTokenStore;
use crate::application::ports::backend::BackendClient;
use crate::application::services::{
    session_channel, AuthService, OptimisticMutations, PatientService, QueryService,
    RealtimeSync, RetryPolicy, RouteGuard, SessionReader, TodoService,
};
use crate::domain::value_objects::CollectionName;
use crate::infrastructure::{KeyringTokenStore, PocketBaseClient, QueryCacheStore};
use crate::presentation::handlers::{AuthHandler, PatientHandler, TodoHandler};
use crate::presentation::Navigator;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::info;

/// アプリケーション全体の状態を管理する構造体
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub backend: Arc<dyn BackendClient>,
    pub cache: Arc<QueryCacheStore>,
    pub session: SessionReader,
    pub queries: Arc<QueryService>,
    pub mutations: Arc<OptimisticMutations>,
    pub realtime: Arc<RealtimeSync>,
    pub auth_service: Arc<AuthService>,
    pub todo_service: Arc<TodoService>,
    pub patient_service: Arc<PatientService>,
    pub guard: Arc<RouteGuard>,
    pub navigator: Navigator,
    pub auth_handler: Arc<AuthHandler>,
    pub todo_handler: Arc<TodoHandler>,
    pub patient_handler: Arc<PatientHandler>,
}

impl AppState {
    /// PocketBase と OS キーチェーンを使う構成
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;
        let backend = Arc::new(PocketBaseClient::new(&config.backend)?);
        let store = Arc::new(KeyringTokenStore::new(&config.backend.base_url));
        info!(base_url = %config.backend.base_url, "backend configured");
        Self::with_backend(config, backend, store)
    }

    /// 任意のバックエンドと認証情報ストアで組み立てる
    pub fn with_backend(
        config: AppConfig,
        backend: Arc<dyn BackendClient>,
        store: Arc<dyn AuthTokenStore>,
    ) -> Result<Self, AppError> {
        let auth_collection = CollectionName::new(config.backend.auth_collection.clone())
            .map_err(AppError::ConfigurationError)?;
        let cache = Arc::new(QueryCacheStore::new(
            config.cache.max_entries,
            config.cache.stale_time,
        ));
        let (writer, session) = session_channel();

        let queries = Arc::new(QueryService::new(
            backend.clone(),
            cache.clone(),
            RetryPolicy::from_config(&config.cache),
        ));
        let mutations = Arc::new(OptimisticMutations::new(backend.clone(), cache.clone()));
        let realtime = Arc::new(RealtimeSync::new(backend.clone(), cache.clone()));
        let auth_service = Arc::new(AuthService::new(
            backend.clone(),
            store,
            cache.clone(),
            writer,
            auth_collection,
        ));
        let todo_service = Arc::new(TodoService::new(
            queries.clone(),
            mutations.clone(),
            realtime.clone(),
            config.cache.page_size,
        ));
        let patient_service = Arc::new(PatientService::new(
            queries.clone(),
            mutations.clone(),
            realtime.clone(),
            config.cache.page_size,
        ));
        let guard = Arc::new(RouteGuard::new(config.router.clone(), session.clone()));

        Ok(Self {
            navigator: Navigator::new(guard.clone()),
            auth_handler: Arc::new(AuthHandler::new(auth_service.clone(), guard.clone())),
            todo_handler: Arc::new(TodoHandler::new(todo_service.clone())),
            patient_handler: Arc::new(PatientHandler::new(patient_service.clone())),
            config,
            backend,
            cache,
            session,
            queries,
            mutations,
            realtime,
            auth_service,
            todo_service,
            patient_service,
            guard,
        })
    }

    /// 保存済みのセッションを復元する。失敗してもサインアウト状態で続行する。
    pub async fn initialize(&self) -> Result<(), AppError> {
        match self.auth_service.restore_session().await? {
            Some(user) => info!(user = user.display_name(), "restored session"),
            None => info!("starting signed out"),
        }
        Ok(())
    }
}
