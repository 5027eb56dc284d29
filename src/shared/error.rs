use crate::shared::validation::ValidationFailureKind;
use std::fmt;

#[derive(Debug, Clone)]
pub enum AppError {
    Network(String),
    Backend { status: u16, message: String },
    NotFound(String),
    Auth(String),
    Unauthorized(String),
    InvalidInput(String),
    ValidationError {
        kind: ValidationFailureKind,
        message: String,
    },
    Realtime(String),
    Cache(String),
    Storage(String),
    ConfigurationError(String),
    SerializationError(String),
    DeserializationError(String),
    Internal(String),
}

impl AppError {
    pub fn validation(kind: ValidationFailureKind, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            kind,
            message: message.into(),
        }
    }

    /// バックエンドが返した HTTP ステータスから適切なバリアントを選ぶ
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => AppError::Unauthorized(message),
            404 => AppError::NotFound(message),
            _ => AppError::Backend { status, message },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Backend { status, .. } => Some(*status),
            AppError::NotFound(_) => Some(404),
            AppError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }

    /// 読み取りクエリの再試行対象かどうか（4xx と入力エラーは再試行しない）
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_) => true,
            AppError::Backend { status, .. } => *status >= 500 || *status == 0,
            _ => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::Backend { .. } => "BACKEND_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::Realtime(_) => "REALTIME_ERROR",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
            AppError::DeserializationError(_) => "DESERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 画面に出すためのメッセージ
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => "Could not reach the server. Check your connection.".into(),
            AppError::Backend { message, .. } => message.clone(),
            AppError::NotFound(_) => "The requested resource wasn't found.".into(),
            AppError::Auth(message) => message.clone(),
            AppError::Unauthorized(_) => "You are not allowed to perform this request.".into(),
            AppError::InvalidInput(message) => message.clone(),
            AppError::ValidationError { message, .. } => message.clone(),
            _ => "Something went wrong. Please try again.".into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Backend { status, message } => {
                write!(f, "Backend error ({}): {}", status, message)
            }
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Auth(msg) => write!(f, "Auth error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::ValidationError { kind, message } => {
                write!(f, "Validation error ({}): {}", kind, message)
            }
            AppError::Realtime(msg) => write!(f, "Realtime error: {}", msg),
            AppError::Cache(msg) => write!(f, "Cache error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::DeserializationError(err.to_string());
        }
        match err.status() {
            Some(status) => AppError::from_status(status.as_u16(), err.to_string()),
            None => AppError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::DeserializationError(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_maps_not_found_and_unauthorized() {
        assert!(matches!(
            AppError::from_status(404, "missing"),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from_status(403, "rules"),
            AppError::Unauthorized(_)
        ));
        assert!(matches!(
            AppError::from_status(400, "bad"),
            AppError::Backend { status: 400, .. }
        ));
    }

    #[test]
    fn only_network_and_server_errors_are_retryable() {
        assert!(AppError::Network("reset".into()).is_retryable());
        assert!(AppError::from_status(503, "down").is_retryable());
        assert!(!AppError::from_status(400, "bad").is_retryable());
        assert!(!AppError::NotFound("x".into()).is_retryable());
        assert!(!AppError::validation(ValidationFailureKind::RequiredField, "x").is_retryable());
    }

    #[test]
    fn user_message_keeps_backend_message() {
        let err = AppError::from_status(400, "Failed to create record.");
        assert_eq!(err.user_message(), "Failed to create record.");
        assert_eq!(err.code(), "BACKEND_ERROR");
        assert_eq!(err.status(), Some(400));
    }
}
