use super::parse_record_id;
use crate::{
    application::services::TodoService,
    presentation::dto::{
        todo_dto::{CreateTodoRequest, ListTodosRequest, TodoDto, UpdateTodoRequest},
        PageResponse, Validate,
    },
    shared::error::AppError,
};
use std::sync::Arc;

pub struct TodoHandler {
    todo_service: Arc<TodoService>,
}

impl TodoHandler {
    pub fn new(todo_service: Arc<TodoService>) -> Self {
        Self { todo_service }
    }

    pub async fn list_todos(
        &self,
        request: ListTodosRequest,
    ) -> Result<PageResponse<TodoDto>, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;

        let page = self.todo_service.list(request.pagination.page()).await?;
        Ok(PageResponse::from_paged(page))
    }

    pub async fn get_todo(&self, id: &str) -> Result<TodoDto, AppError> {
        let id = parse_record_id(id)?;
        Ok(self.todo_service.get(&id).await?.into())
    }

    pub async fn create_todo(&self, request: CreateTodoRequest) -> Result<TodoDto, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;

        Ok(self.todo_service.create(&request.title).await?.into())
    }

    /// タイトル変更と完了状態の切り替えを順に適用する
    pub async fn update_todo(&self, request: UpdateTodoRequest) -> Result<TodoDto, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;
        let id = parse_record_id(&request.id)?;

        let mut updated = None;
        if let Some(title) = &request.title {
            updated = Some(self.todo_service.rename(&id, title).await?);
        }
        if let Some(completed) = request.completed {
            updated = Some(self.todo_service.set_completed(&id, completed).await?);
        }
        updated
            .map(TodoDto::from)
            .ok_or_else(|| AppError::InvalidInput("Nothing to update".to_string()))
    }

    pub async fn delete_todo(&self, id: &str) -> Result<(), AppError> {
        let id = parse_record_id(id)?;
        self.todo_service.delete(&id).await
    }
}
