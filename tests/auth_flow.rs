mod common;

use common::{app, app_with_store, seed_todos, EMAIL, PASSWORD};
use pocket_starter_lib::{
    application::ports::auth_store::AuthTokenStore,
    infrastructure::{backend::BackendOp, InMemoryBackend, MemoryTokenStore},
    presentation::dto::{
        auth_dto::{LoginRequest, SignupRequest},
        ApiResponse,
    },
    AppError,
};
use std::sync::Arc;

#[tokio::test]
async fn signup_signs_in_and_persists_the_token() {
    let backend = InMemoryBackend::new();
    let store = Arc::new(MemoryTokenStore::new());
    let state = app_with_store(&backend, store.clone());

    let response = state
        .auth_handler
        .signup(SignupRequest {
            email: EMAIL.to_string(),
            password: PASSWORD.to_string(),
            password_confirm: PASSWORD.to_string(),
            name: Some("Ada".to_string()),
            redirect: None,
        })
        .await
        .unwrap();
    assert_eq!(response.user.display_name, "Ada");
    assert_eq!(response.redirect_to, "/dashboard");
    assert!(state.session.is_authenticated());

    let stored = store.load().await.unwrap().expect("stored auth");
    assert_eq!(stored.record.get_str("email"), Some(EMAIL));
    assert!(stored.record.get_str("password").is_none());
}

#[tokio::test]
async fn stored_token_restores_session_in_a_new_process() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD).await.unwrap();
    let store = Arc::new(MemoryTokenStore::new());

    let first = app_with_store(&backend, store.clone());
    first.auth_service.login(EMAIL, PASSWORD).await.unwrap();

    let second = app_with_store(&backend.connect_client(), store.clone());
    assert!(!second.session.is_authenticated());
    second.initialize().await.unwrap();

    let session = second.auth_handler.current_session();
    assert!(session.is_authenticated);
    assert_eq!(session.user.unwrap().email.as_deref(), Some(EMAIL));
}

#[tokio::test]
async fn rejected_refresh_discards_stored_credentials() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD).await.unwrap();
    let store = Arc::new(MemoryTokenStore::new());
    app_with_store(&backend, store.clone())
        .auth_service
        .login(EMAIL, PASSWORD)
        .await
        .unwrap();

    let restarted = backend.connect_client();
    restarted.fail_next(
        BackendOp::Auth,
        AppError::Unauthorized("The request requires valid record authorization token.".into()),
    );
    let state = app_with_store(&restarted, store.clone());
    state.initialize().await.unwrap();

    assert!(!state.session.is_authenticated());
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn wrong_password_yields_generic_auth_error() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD).await.unwrap();
    let state = app(&backend);

    let result = state
        .auth_handler
        .login(LoginRequest {
            email: EMAIL.to_string(),
            password: "not-the-password".to_string(),
            redirect: None,
        })
        .await;
    let response = ApiResponse::from_result(result);
    assert!(!response.success);
    assert_eq!(response.error_code.as_deref(), Some("AUTH_ERROR"));
    assert_eq!(response.error.as_deref(), Some("Failed to authenticate."));
    assert!(!state.session.is_authenticated());
}

#[tokio::test]
async fn blank_credentials_never_reach_the_backend() {
    let backend = InMemoryBackend::new();
    let state = app(&backend);

    let err = state
        .auth_handler
        .login(LoginRequest {
            email: "  ".to_string(),
            password: PASSWORD.to_string(),
            redirect: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(backend.calls(BackendOp::Auth), 0);
}

#[tokio::test]
async fn logout_clears_session_and_cache() {
    let backend = InMemoryBackend::new();
    backend.register_user(EMAIL, PASSWORD).await.unwrap();
    seed_todos(&backend, &["Private"]).await;
    let state = app(&backend);
    state.auth_service.login(EMAIL, PASSWORD).await.unwrap();
    state.todo_service.list(1).await.unwrap();
    assert!(state.todo_service.cached(1).await.is_some());

    state.auth_handler.logout().await.unwrap();

    assert!(!state.auth_handler.current_session().is_authenticated);
    assert!(state.todo_service.cached(1).await.is_none());
    assert_eq!(state.cache.size().await, 0);
}
