use super::{PaginationRequest, Validate};
use crate::domain::entities::{Todo, TODO_TITLE_MAX_LEN};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
}

impl Validate for CreateTodoRequest {
    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if self.title.trim().chars().count() > TODO_TITLE_MAX_LEN {
            return Err(format!(
                "Title must be at most {TODO_TITLE_MAX_LEN} characters"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTodoRequest {
    pub id: String,
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl Validate for UpdateTodoRequest {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Todo ID is required".to_string());
        }
        if self.title.is_none() && self.completed.is_none() {
            return Err("Nothing to update".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTodosRequest {
    #[serde(flatten)]
    pub pagination: PaginationRequest,
}

impl Validate for ListTodosRequest {
    fn validate(&self) -> Result<(), String> {
        self.pagination.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodoDto {
    pub id: String,
    pub title: String,
    pub completed: bool,
    /// サーバー確認待ちの楽観的レコード
    pub pending: bool,
    pub created: i64,
    pub updated: i64,
}

impl From<Todo> for TodoDto {
    fn from(todo: Todo) -> Self {
        Self {
            pending: todo.is_pending(),
            id: todo.id.to_string(),
            title: todo.title,
            completed: todo.completed,
            created: todo.created.timestamp(),
            updated: todo.updated.timestamp(),
        }
    }
}
