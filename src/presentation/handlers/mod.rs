pub mod auth_handler;
pub mod patient_handler;
pub mod todo_handler;

pub use auth_handler::AuthHandler;
pub use patient_handler::PatientHandler;
pub use todo_handler::TodoHandler;

use crate::domain::value_objects::RecordId;
use crate::shared::error::AppError;

/// 画面やコマンドから受け取った文字列 ID を検証する
pub fn parse_record_id(raw: &str) -> Result<RecordId, AppError> {
    RecordId::new(raw.trim()).map_err(AppError::InvalidInput)
}
