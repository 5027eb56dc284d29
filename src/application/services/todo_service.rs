use super::mutation_service::OptimisticMutations;
use super::query_service::QueryService;
use super::realtime_service::{RealtimeCallback, RealtimeSubscription, RealtimeSync};
use crate::domain::entities::{Paged, Record, Todo, TODO_TITLE_MAX_LEN};
use crate::domain::value_objects::{CollectionName, ListQuery, RecordId};
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use std::sync::Arc;

pub const TODO_SORT: &str = "-created";

pub struct TodoService {
    queries: Arc<QueryService>,
    mutations: Arc<OptimisticMutations>,
    realtime: Arc<RealtimeSync>,
    collection: CollectionName,
    page_size: u32,
}

impl TodoService {
    pub fn new(
        queries: Arc<QueryService>,
        mutations: Arc<OptimisticMutations>,
        realtime: Arc<RealtimeSync>,
        page_size: u32,
    ) -> Self {
        Self {
            queries,
            mutations,
            realtime,
            collection: CollectionName::todos(),
            page_size,
        }
    }

    pub fn list_query(&self, page: u32) -> ListQuery {
        ListQuery::page(page, self.page_size).with_sort(TODO_SORT)
    }

    pub async fn list(&self, page: u32) -> Result<Paged<Todo>, AppError> {
        let records = self
            .queries
            .list(&self.collection, &self.list_query(page))
            .await?;
        Paged::try_from_page(&records, to_todo)
    }

    /// 取得せずにキャッシュ中の一覧（楽観的に追加された仮 todo を含む）を返す
    pub async fn cached(&self, page: u32) -> Option<Paged<Todo>> {
        let records = self
            .queries
            .peek_list(&self.collection, &self.list_query(page))
            .await?;
        Paged::try_from_page(&records, to_todo).ok()
    }

    pub async fn get(&self, id: &RecordId) -> Result<Todo, AppError> {
        let record = self.queries.detail(&self.collection, id).await?;
        to_todo(&record)
    }

    pub async fn create(&self, title: &str) -> Result<Todo, AppError> {
        let title = validate_title(title)?;
        let record = self
            .mutations
            .create(&self.collection, Todo::new_fields(&title))
            .await?;
        to_todo(&record)
    }

    pub async fn set_completed(&self, id: &RecordId, completed: bool) -> Result<Todo, AppError> {
        let record = self
            .mutations
            .update(&self.collection, id, Todo::completed_fields(completed))
            .await?;
        to_todo(&record)
    }

    pub async fn rename(&self, id: &RecordId, title: &str) -> Result<Todo, AppError> {
        let title = validate_title(title)?;
        let record = self
            .mutations
            .update(&self.collection, id, Todo::title_fields(&title))
            .await?;
        to_todo(&record)
    }

    pub async fn delete(&self, id: &RecordId) -> Result<(), AppError> {
        self.mutations.delete(&self.collection, id).await
    }

    pub async fn watch(&self, callback: Option<RealtimeCallback>) -> RealtimeSubscription {
        self.realtime
            .subscribe_collection(&self.collection, callback)
            .await
    }

    pub async fn watch_one(
        &self,
        id: &RecordId,
        callback: Option<RealtimeCallback>,
    ) -> RealtimeSubscription {
        self.realtime
            .subscribe_record(&self.collection, id, callback)
            .await
    }
}

fn to_todo(record: &Record) -> Result<Todo, AppError> {
    Todo::try_from(record).map_err(AppError::DeserializationError)
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation(
            ValidationFailureKind::RequiredField,
            "Title is required.",
        ));
    }
    if title.chars().count() > TODO_TITLE_MAX_LEN {
        return Err(AppError::validation(
            ValidationFailureKind::TooLong,
            format!("Title must be at most {TODO_TITLE_MAX_LEN} characters."),
        ));
    }
    Ok(title.to_string())
}
