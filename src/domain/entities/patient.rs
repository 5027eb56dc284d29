use super::record::{Fields, Record};
use crate::domain::value_objects::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PATIENT_NAME_MAX_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RecordId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// 患者の新規作成入力
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// 患者の部分更新。`None` のフィールドは送らない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl NewPatient {
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::String(self.name));
        insert_optional(&mut fields, "email", self.email);
        insert_optional(&mut fields, "phone", self.phone);
        insert_optional(&mut fields, "notes", self.notes);
        fields
    }
}

impl PatientChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.notes.is_none()
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = self.name {
            fields.insert("name".to_string(), Value::String(name));
        }
        insert_optional(&mut fields, "email", self.email);
        insert_optional(&mut fields, "phone", self.phone);
        insert_optional(&mut fields, "notes", self.notes);
        fields
    }
}

fn insert_optional(fields: &mut Fields, key: &str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), Value::String(value));
    }
}

fn non_empty(record: &Record, key: &str) -> Option<String> {
    record
        .get_str(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl TryFrom<&Record> for Patient {
    type Error = String;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let name = record
            .get_str("name")
            .ok_or_else(|| format!("Patient {} has no name", record.id))?
            .to_string();
        Ok(Self {
            id: record.id.clone(),
            name,
            email: non_empty(record, "email"),
            phone: non_empty(record, "phone"),
            notes: non_empty(record, "notes"),
            created: record.created,
            updated: record.updated,
        })
    }
}
