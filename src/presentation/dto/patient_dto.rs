use super::{PaginationRequest, Validate};
use crate::domain::entities::{NewPatient, Patient, PatientChanges, PATIENT_NAME_MAX_LEN};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl Validate for CreatePatientRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        if self.name.trim().chars().count() > PATIENT_NAME_MAX_LEN {
            return Err(format!(
                "Name must be at most {PATIENT_NAME_MAX_LEN} characters"
            ));
        }
        Ok(())
    }
}

impl From<CreatePatientRequest> for NewPatient {
    fn from(request: CreatePatientRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            phone: request.phone,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePatientRequest {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl Validate for UpdatePatientRequest {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Patient ID is required".to_string());
        }
        Ok(())
    }
}

impl UpdatePatientRequest {
    pub fn changes(&self) -> PatientChanges {
        PatientChanges {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPatientsRequest {
    #[serde(flatten)]
    pub pagination: PaginationRequest,
    pub search: Option<String>,
}

impl Validate for ListPatientsRequest {
    fn validate(&self) -> Result<(), String> {
        self.pagination.validate()?;
        if let Some(search) = &self.search {
            if search.chars().count() > PATIENT_NAME_MAX_LEN {
                return Err("Search term is too long".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientDto {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub pending: bool,
    pub created: i64,
    pub updated: i64,
}

impl From<Patient> for PatientDto {
    fn from(patient: Patient) -> Self {
        Self {
            pending: patient.id.is_placeholder(),
            id: patient.id.to_string(),
            name: patient.name,
            email: patient.email,
            phone: patient.phone,
            notes: patient.notes,
            created: patient.created.timestamp(),
            updated: patient.updated.timestamp(),
        }
    }
}
