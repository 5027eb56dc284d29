use super::Validate;
use crate::application::services::auth_service::MIN_PASSWORD_LEN;
use crate::domain::entities::{AuthSession, AuthUser};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// ガードが付与した `redirect` クエリの値
    pub redirect: Option<String>,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("Email is required".to_string());
        }
        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub name: Option<String>,
    pub redirect: Option<String>,
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("Email is required".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            ));
        }
        if let Some(name) = &self.name {
            if name.chars().count() > 100 {
                return Err("Name is too long".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDto {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub display_name: String,
    pub verified: bool,
}

impl From<&AuthUser> for UserDto {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            display_name: user.display_name().to_string(),
            verified: user.verified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserDto,
    /// ログイン後に遷移するアプリ内パス
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    pub is_authenticated: bool,
    pub user: Option<UserDto>,
}

impl From<&AuthSession> for SessionResponse {
    fn from(session: &AuthSession) -> Self {
        Self {
            is_authenticated: session.is_authenticated,
            user: session.current_user.as_ref().map(UserDto::from),
        }
    }
}
