// DTOモジュール
pub mod auth_dto;
pub mod patient_dto;
pub mod todo_dto;

// 共通のレスポンス型
use crate::domain::entities::Paged;
use crate::shared::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub error_details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
            error_details: None,
        }
    }

    pub fn from_app_error(error: AppError) -> Self {
        let error_details = match &error {
            AppError::ValidationError { kind, .. } => Some(json!({ "kind": kind.as_str() })),
            AppError::Backend { status, .. } => Some(json!({ "status": status })),
            _ => None,
        };

        Self {
            success: false,
            data: None,
            error: Some(error.user_message()),
            error_code: Some(error.code().to_string()),
            error_details,
        }
    }

    pub fn from_result(result: crate::shared::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::from_app_error(err),
        }
    }
}

// ページネーション
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaginationRequest {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page: Some(1),
            per_page: None,
        }
    }
}

impl PaginationRequest {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

impl Validate for PaginationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.page == Some(0) {
            return Err("page starts at 1".to_string());
        }
        if let Some(per_page) = self.per_page {
            if per_page == 0 || per_page > 500 {
                return Err("per_page must be between 1 and 500".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> PageResponse<T> {
    pub fn from_paged<D>(paged: Paged<D>) -> Self
    where
        T: From<D>,
    {
        Self {
            items: paged.items.into_iter().map(T::from).collect(),
            page: paged.page,
            per_page: paged.per_page,
            total_items: paged.total_items,
            total_pages: paged.total_pages,
        }
    }
}

// バリデーショントレイト
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ValidationFailureKind;

    #[test]
    fn error_envelope_carries_code_and_message() {
        let response: ApiResponse<()> = ApiResponse::from_app_error(AppError::validation(
            ValidationFailureKind::TooLong,
            "Title must be at most 200 characters.",
        ));
        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("VALIDATION_ERROR"));
        assert_eq!(
            response.error.as_deref(),
            Some("Title must be at most 200 characters.")
        );
        assert_eq!(response.error_details, Some(json!({ "kind": "too_long" })));
    }

    #[test]
    fn pagination_rejects_zero_page() {
        let request = PaginationRequest {
            page: Some(0),
            per_page: None,
        };
        assert!(request.validate().is_err());
        assert_eq!(PaginationRequest::default().page(), 1);
    }
}
