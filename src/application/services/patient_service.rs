use super::mutation_service::OptimisticMutations;
use super::query_service::QueryService;
use super::realtime_service::{RealtimeCallback, RealtimeSubscription, RealtimeSync};
use crate::domain::entities::{
    NewPatient, Paged, Patient, PatientChanges, Record, PATIENT_NAME_MAX_LEN,
};
use crate::domain::value_objects::{CollectionName, ListQuery, RecordId};
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use std::sync::Arc;

pub const PATIENT_SORT: &str = "name";

pub struct PatientService {
    queries: Arc<QueryService>,
    mutations: Arc<OptimisticMutations>,
    realtime: Arc<RealtimeSync>,
    collection: CollectionName,
    page_size: u32,
}

impl PatientService {
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
            collection: CollectionName::patients(),
            page_size,
        }
    }

    /// 名前の部分一致検索を `name ~ "..."` フィルタに変換する
    pub fn list_query(&self, page: u32, search: Option<&str>) -> ListQuery {
        let query = ListQuery::page(page, self.page_size).with_sort(PATIENT_SORT);
        match search.map(str::trim).filter(|term| !term.is_empty()) {
            Some(term) => query.with_filter(format!(
                "name ~ \"{}\"",
                term.replace('\\', "\\\\").replace('"', "\\\"")
            )),
            None => query,
        }
    }

    pub async fn list(&self, page: u32, search: Option<&str>) -> Result<Paged<Patient>, AppError> {
        let records = self
            .queries
            .list(&self.collection, &self.list_query(page, search))
            .await?;
        Paged::try_from_page(&records, to_patient)
    }

    pub async fn get(&self, id: &RecordId) -> Result<Patient, AppError> {
        let record = self.queries.detail(&self.collection, id).await?;
        to_patient(&record)
    }

    pub async fn create(&self, input: NewPatient) -> Result<Patient, AppError> {
        let input = NewPatient {
            name: validate_name(&input.name)?,
            email: validate_email(input.email)?,
            phone: non_blank(input.phone),
            notes: non_blank(input.notes),
        };
        let record = self
            .mutations
            .create(&self.collection, input.into_fields())
            .await?;
        to_patient(&record)
    }

    pub async fn update(&self, id: &RecordId, changes: PatientChanges) -> Result<Patient, AppError> {
        if changes.is_empty() {
            return Err(AppError::validation(
                ValidationFailureKind::Generic,
                "Nothing to update.",
            ));
        }
        let name = changes.name.as_deref().map(validate_name).transpose()?;
        let changes = PatientChanges {
            name,
            email: validate_email(changes.email)?,
            ..changes
        };
        let record = self
            .mutations
            .update(&self.collection, id, changes.into_fields())
            .await?;
        to_patient(&record)
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

fn to_patient(record: &Record) -> Result<Patient, AppError> {
    Patient::try_from(record).map_err(AppError::DeserializationError)
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation(
            ValidationFailureKind::RequiredField,
            "Name is required.",
        ));
    }
    if name.chars().count() > PATIENT_NAME_MAX_LEN {
        return Err(AppError::validation(
            ValidationFailureKind::TooLong,
            format!("Name must be at most {PATIENT_NAME_MAX_LEN} characters."),
        ));
    }
    Ok(name.to_string())
}

fn validate_email(email: Option<String>) -> Result<Option<String>, AppError> {
    match non_blank(email) {
        Some(email) if !email.contains('@') => Err(AppError::validation(
            ValidationFailureKind::InvalidEmail,
            "Please enter a valid email address.",
        )),
        other => Ok(other),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::backend::MockBackend;
    use crate::application::services::query_service::RetryPolicy;
    use crate::domain::entities::RecordPage;
    use crate::infrastructure::cache::QueryCacheStore;

    fn service(backend: MockBackend) -> PatientService {
        let backend = Arc::new(backend);
        let cache = Arc::new(QueryCacheStore::new(10, 60));
        PatientService::new(
            Arc::new(QueryService::new(backend.clone(), cache.clone(), RetryPolicy::none())),
            Arc::new(OptimisticMutations::new(backend.clone(), cache.clone())),
            Arc::new(RealtimeSync::new(backend, cache)),
            20,
        )
    }

    #[test]
    fn search_becomes_escaped_name_filter() {
        let service = service(MockBackend::new());
        let query = service.list_query(1, Some(r#" Ada "the" "#));
        assert_eq!(query.filter.as_deref(), Some(r#"name ~ "Ada \"the\"""#));
        assert!(service.list_query(1, Some("  ")).filter.is_none());
    }

    #[tokio::test]
    async fn list_passes_filter_to_backend() {
        let mut backend = MockBackend::new();
        backend
            .expect_list()
            .withf(|collection, query| {
                collection.as_str() == "patients" && query.filter.as_deref() == Some(r#"name ~ "ada""#)
            })
            .times(1)
            .returning(|_, _| Ok(RecordPage::empty(1, 20)));
        let page = service(backend).list(1, Some("ada")).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn invalid_email_and_empty_changes_are_rejected() {
        let service = service(MockBackend::new());
        let err = service
            .create(NewPatient {
                name: "Ada".into(),
                email: Some("ada.example.com".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::ValidationError {
                kind: ValidationFailureKind::InvalidEmail,
                ..
            }
        ));

        let id = RecordId::new("p1").unwrap();
        assert!(service.update(&id, PatientChanges::default()).await.is_err());
    }
}
