use crate::{
    application::services::{AuthService, RouteGuard},
    presentation::dto::{
        auth_dto::{LoginRequest, LoginResponse, SessionResponse, SignupRequest, UserDto},
        Validate,
    },
    shared::error::AppError,
};
use std::sync::Arc;

pub struct AuthHandler {
    auth_service: Arc<AuthService>,
    guard: Arc<RouteGuard>,
}

impl AuthHandler {
    pub fn new(auth_service: Arc<AuthService>, guard: Arc<RouteGuard>) -> Self {
        Self {
            auth_service,
            guard,
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;

        let user = self
            .auth_service
            .login(&request.email, &request.password)
            .await?;

        Ok(LoginResponse {
            user: UserDto::from(&user),
            redirect_to: self.guard.post_login_target(request.redirect.as_deref()),
        })
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<LoginResponse, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;

        let user = self
            .auth_service
            .signup(
                &request.email,
                &request.password,
                &request.password_confirm,
                request.name.as_deref(),
            )
            .await?;

        Ok(LoginResponse {
            user: UserDto::from(&user),
            redirect_to: self.guard.post_login_target(request.redirect.as_deref()),
        })
    }

    /// ログアウト後はログイン画面へ
    pub async fn logout(&self) -> Result<String, AppError> {
        self.auth_service.logout().await;
        Ok(self.guard.config().login_path.clone())
    }

    pub async fn restore_session(&self) -> Result<SessionResponse, AppError> {
        self.auth_service.restore_session().await?;
        Ok(self.current_session())
    }

    pub fn current_session(&self) -> SessionResponse {
        SessionResponse::from(&self.auth_service.current_session())
    }
}
