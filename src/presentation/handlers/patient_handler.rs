use super::parse_record_id;
use crate::{
    application::services::PatientService,
    presentation::dto::{
        patient_dto::{
            CreatePatientRequest, ListPatientsRequest, PatientDto, UpdatePatientRequest,
        },
        PageResponse, Validate,
    },
    shared::error::AppError,
};
use std::sync::Arc;

pub struct PatientHandler {
    patient_service: Arc<PatientService>,
}

impl PatientHandler {
    pub fn new(patient_service: Arc<PatientService>) -> Self {
        Self { patient_service }
    }

    pub async fn list_patients(
        &self,
        request: ListPatientsRequest,
    ) -> Result<PageResponse<PatientDto>, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;

        let page = self
            .patient_service
            .list(request.pagination.page(), request.search.as_deref())
            .await?;
        Ok(PageResponse::from_paged(page))
    }

    pub async fn get_patient(&self, id: &str) -> Result<PatientDto, AppError> {
        let id = parse_record_id(id)?;
        Ok(self.patient_service.get(&id).await?.into())
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
    ) -> Result<PatientDto, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;

        Ok(self.patient_service.create(request.into()).await?.into())
    }

    pub async fn update_patient(
        &self,
        request: UpdatePatientRequest,
    ) -> Result<PatientDto, AppError> {
        request.validate().map_err(AppError::InvalidInput)?;
        let id = parse_record_id(&request.id)?;

        Ok(self
            .patient_service
            .update(&id, request.changes())
            .await?
            .into())
    }

    pub async fn delete_patient(&self, id: &str) -> Result<(), AppError> {
        let id = parse_record_id(id)?;
        self.patient_service.delete(&id).await
    }
}
