use super::record::{Fields, Record};
use crate::domain::value_objects::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TODO_TITLE_MAX_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: RecordId,
    pub title: String,
    pub completed: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Todo {
    /// 作成用のフィールド
    pub fn new_fields(title: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::String(title.to_string()));
        fields.insert("completed".to_string(), Value::Bool(false));
        fields
    }

    pub fn completed_fields(completed: bool) -> Fields {
        let mut fields = Fields::new();
        fields.insert("completed".to_string(), Value::Bool(completed));
        fields
    }

    pub fn title_fields(title: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::String(title.to_string()));
        fields
    }

    /// サーバー未確認（仮 ID）の todo か
    pub fn is_pending(&self) -> bool {
        self.id.is_placeholder()
    }
}

impl TryFrom<&Record> for Todo {
    type Error = String;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let title = record
            .get_str("title")
            .ok_or_else(|| format!("Todo {} has no title", record.id))?
            .to_string();
        Ok(Self {
            id: record.id.clone(),
            title,
            completed: record.get_bool("completed").unwrap_or(false),
            created: record.created,
            updated: record.updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_from_record() {
        let record = Record::new(RecordId::new("t1").unwrap(), Todo::new_fields("Buy milk"));
        let todo = Todo::try_from(&record).unwrap();
        assert_eq!(todo.title, "Buy milk");
        assert!(!todo.completed);
        assert!(!todo.is_pending());
    }

    #[test]
    fn missing_title_is_an_error() {
        let record = Record::new(RecordId::new("t1").unwrap(), Fields::new());
        assert!(Todo::try_from(&record).is_err());
    }
}
