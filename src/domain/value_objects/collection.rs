use serde::{Deserialize, Serialize};
use std::fmt;

pub const TODOS_COLLECTION: &str = "todos";
pub const PATIENTS_COLLECTION: &str = "patients";
pub const USERS_COLLECTION: &str = "users";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn todos() -> Self {
        Self(TODOS_COLLECTION.to_string())
    }

    pub fn patients() -> Self {
        Self(PATIENTS_COLLECTION.to_string())
    }

    pub fn users() -> Self {
        Self(USERS_COLLECTION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Collection name cannot be empty".to_string());
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!("Invalid collection name: {value}"));
        }
        Ok(())
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CollectionName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_like_names() {
        assert!(CollectionName::new("todos").is_ok());
        assert!(CollectionName::new("_pb_users_auth_").is_ok());
        assert!(CollectionName::new("").is_err());
        assert!(CollectionName::new("todos/../users").is_err());
    }
}
